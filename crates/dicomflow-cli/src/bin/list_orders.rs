use anyhow::{Context, Result};
use clap::Parser;
use dicomflow_api_client::ApiClient;
use dicomflow_cli::{format_bytes, init_tracing, truncate_string};
use dicomflow_core::models::{OrderBucket, OrderDetail, OrderSummary};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "list_orders")]
#[command(about = "List your DICOM orders, or show one order in detail")]
struct Args {
    /// Show the files and collaborators of this order instead of the list
    #[arg(long, value_name = "UUID")]
    order_id: Option<Uuid>,

    /// Which orders to list: current or completed
    #[arg(long, default_value = "current")]
    status: String,

    /// Output format: json or table (default: table)
    #[arg(long, default_value = "table")]
    format: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let client = ApiClient::from_env()
        .context("Failed to create API client. Set DICOMFLOW_TOKEN and DICOMFLOW_API_URL")?;

    if let Some(order_id) = args.order_id {
        let detail = client.get_order(order_id).await?;
        match args.format.as_str() {
            "json" => println!("{}", serde_json::to_string_pretty(&detail)?),
            _ => print_order_detail(&detail),
        }
        return Ok(());
    }

    let bucket = match args.status.as_str() {
        "current" => OrderBucket::Current,
        "completed" => OrderBucket::Completed,
        _ => return Err(anyhow::anyhow!("Invalid status. Must be: current or completed")),
    };

    let orders = client.list_orders(bucket).await?;

    match args.format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&orders)?),
        _ => print_orders_table(&orders, &args.status),
    }

    Ok(())
}

fn print_orders_table(orders: &[OrderSummary], bucket: &str) {
    println!("\n=== {} orders ===\n", bucket);

    if orders.is_empty() {
        println!("No orders found.");
        return;
    }

    println!(
        "{:<36} {:<12} {:>8} {:>6} {:<30} {:>20}",
        "Order ID", "Status", "Progress", "Files", "Collaborators", "Last Update"
    );
    println!("{}", "-".repeat(118));

    for order in orders {
        println!(
            "{:<36} {:<12} {:>7}% {:>6} {:<30} {:>20}",
            order.order_id,
            order.status.as_str(),
            order.progress,
            order.file_count,
            truncate_string(&order.collaborating_doctors.join(", "), 30),
            order.last_update.format("%Y-%m-%d %H:%M:%S")
        );
    }

    println!("\nTotal: {} order(s)", orders.len());
}

fn print_order_detail(detail: &OrderDetail) {
    println!("\n=== Order {} ===\n", detail.order_id);
    println!("Patient:   {}", detail.patient_id);
    println!("Status:    {} ({}%)", detail.status.as_str(), detail.progress);

    if detail.collaborating_doctors.is_empty() {
        println!("Doctors:   none");
    } else {
        let names: Vec<&str> = detail
            .collaborating_doctors
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        println!("Doctors:   {}", names.join(", "));
    }

    println!(
        "\n{:<30} {:<40} {:>10} {:>20}",
        "Folder", "File", "Size", "Uploaded At"
    );
    println!("{}", "-".repeat(103));

    for file in &detail.files {
        let folder = if file.folder_path.is_empty() {
            "/"
        } else {
            file.folder_path.as_str()
        };
        println!(
            "{:<30} {:<40} {:>10} {:>20}",
            truncate_string(folder, 30),
            truncate_string(&file.file_name, 40),
            format_bytes(file.size_bytes.max(0) as u64),
            file.uploaded_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
}
