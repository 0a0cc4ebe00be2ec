#[tokio::main]
async fn main() {
    let code = arcai_scan::app::startup::startup().await;
    std::process::exit(code);
}
