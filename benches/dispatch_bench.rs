//! Benchmarks the middleware dispatch hot path named as the
//! concurrency-sensitive 25% slice of the core in spec.md §2: a downstream
//! GET routed through a chain of pass-through handlers to a local device.

use std::sync::Arc;

use async_trait::async_trait;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use device_mesh_node::domain::device::Device;
use device_mesh_node::domain::error::DeviceError;
use device_mesh_node::domain::request::{Method, Request};
use device_mesh_node::middleware::{Handler, MiddlewareDispatcher, Next};
use device_mesh_node::registry::{DeviceRegistry, ProxyRegistry};
use serde_json::Value;
use tokio::runtime::Runtime;

struct Echo;

#[async_trait]
impl Device for Echo {
    async fn get(&self, property: &str) -> Result<Value, DeviceError> {
        Ok(Value::String(property.to_string()))
    }
    async fn set(&self, _property: &str, value: Value) -> Result<Value, DeviceError> {
        Ok(value)
    }
    async fn invoke(&self, _method: &str, _params: Value) -> Result<Value, DeviceError> {
        Ok(Value::Null)
    }
    async fn subscribe(&self, _event: &str) -> Result<Value, DeviceError> {
        Ok(Value::Null)
    }
    async fn describe(&self, _property: &str) -> Result<Value, DeviceError> {
        Ok(Value::Null)
    }
    async fn config(&self, _property: &str, _value: Value) -> Result<Value, DeviceError> {
        Ok(Value::Null)
    }
}

struct PassThrough;

#[async_trait]
impl Handler for PassThrough {
    async fn handle(&self, _req: Request, next: Next) -> Result<Option<Value>, DeviceError> {
        Ok(Some(next.call().await?))
    }
}

fn build_dispatcher(handler_count: usize) -> Arc<MiddlewareDispatcher> {
    let device_registry = Arc::new(DeviceRegistry::new());
    device_registry.insert("bench:device", Arc::new(Echo)).unwrap();
    let dispatcher = MiddlewareDispatcher::new(device_registry, Arc::new(ProxyRegistry::new()));
    for _ in 0..handler_count {
        dispatcher.push_handler(Arc::new(PassThrough));
    }
    dispatcher
}

fn dispatch_bench(c: &mut Criterion) {
    let rt = Runtime::new().expect("failed to build a tokio runtime for benchmarking");

    let mut group = c.benchmark_group("middleware_dispatch");
    for handler_count in [0usize, 1, 5, 20] {
        let dispatcher = build_dispatcher(handler_count);
        group.bench_function(format!("downstream_get/{handler_count}_handlers"), |b| {
            b.to_async(&rt).iter(|| {
                let dispatcher = Arc::clone(&dispatcher);
                async move {
                    let result = dispatcher
                        .dispatch(Request::new("bench:device", Method::Get, "prop"))
                        .await
                        .expect("dispatch should succeed");
                    black_box(result);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, dispatch_bench);
criterion_main!(benches);
