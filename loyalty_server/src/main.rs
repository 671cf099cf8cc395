use dotenvy::dotenv;
use log::info;
use loyalty_server::{cli::handle_command_line_args, config::ServerConfig, server::run_server};

#[actix_web::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let Some(args) = handle_command_line_args() else {
        return;
    };
    let config = ServerConfig::from_args_and_env(args);

    info!("🚀️ Starting server on {}", config.run_address);
    match run_server(config).await {
        Ok(_) => println!("Bye!"),
        Err(e) => eprintln!("{e}"),
    }
}
