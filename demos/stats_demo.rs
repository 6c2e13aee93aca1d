use clap::Parser;
use pooled_hash::HashMap;
use pooled_hash::RecyclingPool;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    /// Percentage of entries to remove after filling.
    #[arg(short = 'r', long = "remove_percent", default_value_t = 25)]
    remove_percent: u64,
}

fn print_histogram(histogram: &[usize]) {
    println!("=== Chain Length Histogram ===");
    let total: usize = histogram.iter().sum();
    for (length, &count) in histogram.iter().enumerate() {
        if count == 0 {
            continue;
        }
        println!(
            "{:>3}: {:>8} ({:.2}%)",
            length,
            count,
            count as f64 / total.max(1) as f64 * 100.0
        );
    }
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating HashMap with target capacity: {}",
        args.target_capacity
    );

    let pool = RecyclingPool::new();
    let mut map: HashMap<u64, u64, _, _> = HashMap::with_capacity_and_hasher_in(
        args.target_capacity,
        pooled_hash::DefaultHashBuilder::default(),
        &pool,
    );

    println!("Actual capacity: {}", map.capacity());
    println!("Filling map with u64 values...");

    let num_values = map.capacity() as u64;
    for i in 0..num_values {
        if let Err(e) = map.add(i, i * 2) {
            panic!("failed to add {i}: {e}");
        }
    }

    println!("Inserted {} values into map", map.len());
    print_histogram(&map.chain_length_histogram());
    map.debug_stats().print();

    let remove_every = (100 / args.remove_percent.clamp(1, 100)).max(1);
    let removed = (0..num_values)
        .filter(|i| i % remove_every == 0)
        .filter(|i| map.remove(i).is_some())
        .count();
    println!("Removed {removed} values");
    map.debug_stats().print();

    map.trim_excess();
    println!("After trim_excess:");
    map.debug_stats().print();

    drop(map);
    println!("Arrays retained by the pool: {}", pool.retained_count());
}
