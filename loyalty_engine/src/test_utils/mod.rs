pub mod oracle;
pub mod prepare_env;
