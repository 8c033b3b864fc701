use std::error::Error;

use respline::Client;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let addr = std::env::var("REDIS_URL").unwrap_or_else(|_| "localhost:6379".into());
    let command: Vec<_> = std::env::args().collect();
    let command = &command[1..];

    let mut client = Client::new(&addr).await?;
    let reply = client.call(command).await?;
    println!("RESP: {:?}", reply);

    Ok(())
}
