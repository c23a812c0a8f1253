use std::sync::atomic::{AtomicU32, Ordering};

use genai_relay::{with_retry, RelayError};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let attempts = AtomicU32::new(0);

    let answer = with_retry(
        || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(RelayError::Http {
                        status: 503,
                        body: "overloaded".to_owned(),
                    })
                } else {
                    Ok("ok")
                }
            }
        },
        3,
        200,
    )
    .await?;

    println!("{answer} after {} attempts", attempts.load(Ordering::SeqCst));
    Ok(())
}
