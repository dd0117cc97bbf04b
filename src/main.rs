#[tokio::main]
async fn main() {
    if let Err(e) = serenity_lib::run().await {
        eprintln!("serenity: {}", e);
        std::process::exit(1);
    }
}
