use genai_relay::{RelayClient, RequestDescriptor};
use reqwest::Method;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let api_key = std::env::var("GEMINI_API_KEY")?;

    // Honors GENAI_PROXY_BASE_URL when set.
    let client = RelayClient::from_env()?;
    if let Some(proxy) = client.proxy_origin() {
        println!("redirecting through {proxy}");
    }

    let request = RequestDescriptor::parse(
        "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent",
    )?
    .method(Method::POST)
    .header("x-goog-api-key", &api_key)?
    .json(&serde_json::json!({
        "contents": [{ "parts": [{ "text": "Say hello." }] }]
    }))?;

    let response = client.send(request).await?;
    println!("{}", response.text().await?);

    Ok(())
}
