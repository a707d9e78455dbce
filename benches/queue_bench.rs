//! Benchmarks for the task engine.
//!
//! Benchmarks cover:
//! - Priority queue push/pop and re-prioritization
//! - Semaphore allocation under contention
//! - Task execution overhead
//! - End-to-end scheduling through the executor

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

use prometheus_task_engine::config::ExecutorConfig;
use prometheus_task_engine::core::{
    Context, Executor, Priority, PriorityQueue, Resource, ResourceManager, Scheduler, Semaphore, Task,
};

use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

fn noop_task(id: u64, priority: Priority) -> Arc<Task> {
    Arc::new(Task::new(format!("bench-{id}"), priority, |_ctx| async { Ok(()) }))
}

fn mixed_priority(i: u64) -> Priority {
    match i % 3 {
        0 => Priority::Low,
        1 => Priority::Medium,
        _ => Priority::High,
    }
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_push_pop(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_push_pop");

    for size in [100, 1_000, 10_000] {
        let tasks: Vec<_> = (0..size).map(|i| noop_task(i, mixed_priority(i))).collect();
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &tasks, |b, tasks| {
            b.iter(|| {
                let q = PriorityQueue::new();
                for task in tasks {
                    q.push(Arc::clone(task));
                }
                while let Some(task) = q.pop() {
                    black_box(task);
                }
            });
        });
    }
    group.finish();
}

fn bench_queue_update_priority(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_update_priority");

    for size in [100, 1_000] {
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            let q = PriorityQueue::new();
            let tasks: Vec<_> = (0..size).map(|i| noop_task(i, Priority::Low)).collect();
            for task in &tasks {
                q.push(Arc::clone(task));
            }
            let mut flip = false;
            b.iter(|| {
                flip = !flip;
                let target = if flip { Priority::High } else { Priority::Low };
                q.update_priority(&tasks[tasks.len() / 2], target);
            });
        });
    }
    group.finish();
}

// ============================================================================
// Resource Benchmarks
// ============================================================================

fn bench_semaphore_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("semaphore_contention");

    for threads in [1, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let sem = Arc::new(Semaphore::new(2));
                let handles: Vec<_> = (0..threads)
                    .map(|_| {
                        let sem = Arc::clone(&sem);
                        thread::spawn(move || {
                            for _ in 0..1_000 {
                                if sem.allocate().is_ok() {
                                    let _ = sem.deallocate();
                                }
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            });
        });
    }
    group.finish();
}

fn bench_manager_allocate(c: &mut Criterion) {
    let manager = ResourceManager::new();
    let _ = manager.register_semaphore("bench", 1);

    c.bench_function("manager_acquire_release", |b| {
        b.iter(|| {
            let guard = manager.acquire("bench");
            black_box(&guard);
        });
    });
}

// ============================================================================
// Execution Benchmarks
// ============================================================================

fn bench_task_execute(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    c.bench_function("task_execute_noop", |b| {
        b.to_async(&rt).iter(|| async {
            let task = noop_task(0, Priority::Medium);
            black_box(task.execute(&Context::background()).await)
        });
    });
}

fn bench_scheduler_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_throughput");
    group.sample_size(20);

    for task_count in [100u64, 1_000] {
        group.throughput(Throughput::Elements(task_count));
        group.bench_with_input(BenchmarkId::from_parameter(task_count), &task_count, |b, &task_count| {
            b.iter(|| {
                let executor = Executor::new(ExecutorConfig::new().with_worker_count(4)).unwrap();
                let scheduler = Scheduler::new(executor, Arc::new(ResourceManager::new()));
                scheduler.start().unwrap();
                for i in 0..task_count {
                    scheduler.submit(noop_task(i, mixed_priority(i))).unwrap();
                }
                scheduler.soft_stop().unwrap();
            });
        });
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(queue_benches, bench_queue_push_pop, bench_queue_update_priority);

criterion_group!(resource_benches, bench_semaphore_contention, bench_manager_allocate);

criterion_group!(execution_benches, bench_task_execute, bench_scheduler_throughput);

criterion_main!(queue_benches, resource_benches, execution_benches);
