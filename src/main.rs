#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    poster_gen_server::run().await
}
