use log::info;

mod logging;

#[tokio::main]
async fn main() {
    logging::init_logger();

    info!("Starting watchparty server...");
    watchparty_server::run_server().await;
}
