use resilient_http::{ClientConfig, ClientPool, RequestOptions};
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = std::env::var("API_BASE_URL").unwrap_or_else(|_| "https://httpbin.org".to_owned());

    let pool = ClientPool::new();
    let client = pool.get_client(ClientConfig {
        retries: 2,
        ..ClientConfig::with_base_url(base_url)
    })?;

    let created = client
        .post("/anything", RequestOptions::new().body(json!({"name": "Kit"})))
        .await?;
    println!("{} {}: {:?}", created.status, created.status_text, created.body);

    let fetched = client
        .get("/get", RequestOptions::new().header("X-Demo", "1").timeout_ms(5_000))
        .await?;
    println!("{} {}", fetched.status, fetched.status_text);

    pool.dispose_all();
    Ok(())
}
