#[cfg(not(target_arch = "wasm32"))]
#[tokio::main]
async fn main() -> Result<(), notion_site::server::ServerError> {
    use clap::Parser;
    use notion_site::server::config::ServerArgs;
    use notion_site::server::observability::init_logging;

    let args = ServerArgs::parse();
    init_logging(args.log_format);
    notion_site::server::serve(args).await
}

#[cfg(target_arch = "wasm32")]
fn main() {}
