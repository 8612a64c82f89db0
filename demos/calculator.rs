//! Calculator worker - typed endpoints over stdin/stdout.
//!
//! This example demonstrates:
//! - Declaring immediate and suspending endpoints with typed parameters
//! - Defaults, doc-derived descriptions and a handler-raised error
//! - Printing the deployment manifest instead of serving
//!
//! # Running
//!
//! ```text
//! $ cargo run --example calculator
//! {"op":"call","method":"add","params":{"a":2,"b":3}}
//! {"ok":true,"result":5.0,"done":true}
//!
//! $ cargo run --example calculator -- manifest
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rpc_worker::{Args, Endpoint, HandlerError, Manifest, Service, ServiceState};

#[derive(Default)]
struct Calculator {
    calls: AtomicU64,
}

impl ServiceState for Calculator {
    fn teardown(&self) -> Result<(), HandlerError> {
        tracing::info!(calls = self.calls.load(Ordering::Relaxed), "Calculator done");
        Ok(())
    }
}

fn add(calc: &Calculator, args: Args) -> Result<f64, HandlerError> {
    calc.calls.fetch_add(1, Ordering::Relaxed);
    Ok(args.get::<f64>("a")? + args.get::<f64>("b")?)
}

fn divide(calc: &Calculator, args: Args) -> Result<f64, HandlerError> {
    calc.calls.fetch_add(1, Ordering::Relaxed);
    let b: f64 = args.get("b")?;
    if b == 0.0 {
        return Err(HandlerError::new("ZeroDivisionError", "divide by zero"));
    }
    Ok(args.get::<f64>("a")? / b)
}

async fn sum_slowly(calc: Arc<Calculator>, args: Args) -> Result<f64, HandlerError> {
    let values: Vec<f64> = args.get("values")?;
    let delay: u64 = args.get("delay_ms")?;
    args.logger().info(&format!("summing {} values", values.len()));

    let mut total = 0.0;
    for value in values {
        tokio::time::sleep(Duration::from_millis(delay)).await;
        total += value;
    }
    calc.calls.fetch_add(1, Ordering::Relaxed);
    Ok(total)
}

fn service() -> Result<Service<Calculator>, rpc_worker::RegistryError> {
    Service::builder(Calculator::default())
        .version("1.0.0")
        .description("Basic arithmetic")
        .endpoint(
            Endpoint::immediate("add", add)
                .doc(
                    "Add two numbers.

                    Args:
                        a: First operand
                        b: Second operand",
                )
                .param::<f64>("a")
                .param::<f64>("b")
                .returns::<f64>(),
        )
        .endpoint(
            Endpoint::immediate("divide", divide)
                .doc(
                    "Divide a by b.

                    Args:
                        a: Dividend
                        b: Divisor, must not be zero

                    Raises:
                        ZeroDivisionError: when b is zero",
                )
                .param::<f64>("a")
                .param_default::<f64>("b", 1.0)
                .returns::<f64>(),
        )
        .endpoint(
            Endpoint::suspending("sum_slowly", sum_slowly)
                .doc(
                    "Sum a list, pausing between items.

                    Args:
                        values: Numbers to add
                        delay_ms: Pause per item in milliseconds",
                )
                .param::<Vec<f64>>("values")
                .param_default::<u64>("delay_ms", 10)
                .returns::<f64>(),
        )
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let service = service()?;

    if std::env::args().nth(1).as_deref() == Some("manifest") {
        print!("{}", Manifest::from_schema(&service.schema()).to_yaml()?);
        return Ok(());
    }

    rpc_worker::worker::run_from_env(service).await?;
    Ok(())
}
