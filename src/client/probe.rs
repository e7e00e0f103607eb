use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use usdt_payment_checker::services::explorer::USER_AGENT;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    // Load configuration
    dotenvy::dotenv().ok();

    let base_url = std::env::var("CHECKER_URL")
        .unwrap_or_else(|_| "http://localhost:8080".to_string());

    let mut args = std::env::args().skip(1);
    let (Some(address), Some(amount)) = (args.next(), args.next()) else {
        println!("Usage: payment-probe <address> <amount>");
        println!("Set CHECKER_URL to point at a running payment checker.");
        return Ok(());
    };

    println!("USDT Payment Probe");
    println!("==================");
    println!("Checker: {}", base_url);
    println!("Address: {}", address);
    println!("Amount:  {} USDT", amount);
    println!();

    let report = request_check(&base_url, &address, &amount).await?;

    if report["confirmed"].as_bool() == Some(true) {
        println!("[CONFIRMED] Payment received");
    } else if report["manualMode"].as_bool() == Some(true) {
        println!("[MANUAL] Explorer unavailable, verify by hand:");
        println!("   {}", report["debugInfo"]["manualVerificationUrl"].as_str().unwrap_or("-"));
        if let Some(steps) = report["debugInfo"]["instructions"].as_array() {
            for (i, step) in steps.iter().enumerate() {
                println!("   {}. {}", i + 1, step.as_str().unwrap_or_default());
            }
        }
    } else {
        println!("[PENDING] No matching payment yet");
    }

    println!("Balance: {}", report["balance"]);
    println!();
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

async fn request_check(base_url: &str, address: &str, amount: &str) -> Result<Value> {
    let client = Client::builder().user_agent(USER_AGENT).build()?;
    let url = format!("{}/check-payment", base_url.trim_end_matches('/'));

    let response = client
        .get(&url)
        .query(&[("address", address), ("amount", amount)])
        .send()
        .await
        .with_context(|| format!("Failed to reach checker at {}", url))?;

    let status = response.status();
    let body: Value = response.json().await.context("Checker returned invalid JSON")?;

    if !status.is_success() {
        anyhow::bail!(
            "Checker rejected the request ({}): {}",
            status,
            body["error"].as_str().unwrap_or("unknown error")
        );
    }

    Ok(body)
}
