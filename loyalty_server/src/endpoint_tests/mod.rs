mod accounts;
mod helpers;
mod orders;
