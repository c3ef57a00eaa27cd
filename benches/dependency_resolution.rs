#![allow(missing_docs)]

//! Benchmarks for `dependsOn` ordering of context artefacts.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use locally::dependency;
use locally::infrastructure::Stack;

fn stack(name: String, depends_on: Vec<String>) -> Stack {
    Stack {
        name,
        depends_on,
        ..Stack::default()
    }
}

/// `stack_{n-1} -> ... -> stack_0`, declared last dependency first
fn reversed_chain(count: usize) -> Vec<Stack> {
    (0..count)
        .rev()
        .map(|i| {
            let depends_on = if i == 0 {
                Vec::new()
            } else {
                vec![format!("stack_{}", i - 1)]
            };
            stack(format!("stack_{i}"), depends_on)
        })
        .collect()
}

/// Every stack depends on one shared network stack declared last
fn fan_in(count: usize) -> Vec<Stack> {
    let mut stacks: Vec<Stack> = (0..count)
        .map(|i| stack(format!("app_{i}"), vec!["network".to_string()]))
        .collect();
    stacks.push(stack("network".to_string(), Vec::new()));
    stacks
}

fn dependency_resolution_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_resolution");

    for count in [10_usize, 50, 100] {
        let chain = reversed_chain(count);
        group.bench_function(format!("reversed_chain_{count}"), |b| {
            b.iter(|| {
                let resolved = dependency::resolve(chain.clone()).map_or(0, |r| r.len());
                black_box(resolved);
            });
        });

        let fan = fan_in(count);
        group.bench_function(format!("fan_in_{count}"), |b| {
            b.iter(|| {
                let resolved = dependency::resolve(fan.clone()).map_or(0, |r| r.len());
                black_box(resolved);
            });
        });
    }

    let chain = reversed_chain(50);
    group.bench_function("closure_of_chain_middle", |b| {
        b.iter(|| {
            let closure = dependency::closure(chain.clone(), "stack_25").map_or(0, |r| r.len());
            black_box(closure);
        });
    });

    group.finish();
}

criterion_group!(benches, dependency_resolution_benchmark);
criterion_main!(benches);
