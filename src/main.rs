// runs the correctness battery, the throughput sweep and the extended checks
// and prints a report; the exit status does not depend on the results

use msqueue::harness::{self, CheckOutcome, SetOutcome};
use msqueue::Config;

use tracing::Level;

const RULE: &str = "=============================================================";

fn main() {
    tracing_subscriber::fmt().with_max_level(Level::WARN).init();

    println!("{}", RULE);
    println!("    Michael & Scott Lock-Free Queue");
    println!("{}\n", RULE);

    println!("--- CORRECTNESS TESTS ---");
    let outcomes = harness::run_checks(&harness::core_checks());
    for (idx, outcome) in outcomes.iter().enumerate() {
        print_outcome(idx + 1, outcome);
    }

    let passed = outcomes.iter().filter(|outcome| outcome.passed()).count();
    println!("\n--- TEST SUMMARY ---");
    println!("Tests Passed: {}/{}", passed, outcomes.len());

    let config = Config::default();
    println!("\n--- PERFORMANCE BENCHMARKS ---");
    println!("Operations per thread: {}", config.ops_per_thread());
    println!(
        "{:<8} | {:<15} | {:<15} | {:<10}",
        "Threads", "Lock-Based (s)", "Lock-Free (s)", "Speedup"
    );
    println!("-------------------------------------------------------------");
    let rows = harness::sweep(&config);
    for row in &rows {
        println!(
            "{:<8} | {:<15.4} | {:<15.4} | {:.2}x",
            row.threads,
            row.locked.as_secs_f64(),
            row.lock_free.as_secs_f64(),
            row.speedup()
        );
    }

    println!("\n{}", RULE);
    println!("--- EXTENDED TEST SETS ---");
    println!("{}", RULE);
    let sets = harness::run_extended_sets();
    for (idx, set) in sets.iter().enumerate() {
        print_set(idx + 1, set);
    }

    let set_passed: usize = sets.iter().map(|set| set.passed).sum();
    let set_total: usize = sets.iter().map(|set| set.total).sum();

    println!("\n{}", RULE);
    println!("--- FINAL TEST SUMMARY ---");
    println!("{}", RULE);
    println!("Core Correctness Tests: {}/{} PASS", passed, outcomes.len());
    println!("Performance Benchmarks: {} thread configurations tested", rows.len());
    println!(
        "Extended Test Cases: {}/{} PASS ({:.1}%)",
        set_passed,
        set_total,
        percent(set_passed, set_total)
    );
    println!("\nTotal Test Cases: {} PASS", passed + set_passed);
    println!("{}", RULE);
}

fn print_outcome(number: usize, outcome: &CheckOutcome) {
    match &outcome.result {
        Ok(()) => println!("Test {}: {}... PASS", number, outcome.name),
        Err(failure) => println!("Test {}: {}... FAIL ({})", number, outcome.name, failure),
    }
}

fn print_set(number: usize, set: &SetOutcome) {
    println!("\n[Test Set {}] {} ({} tests)...", number, set.name, set.total);
    println!("   Result: {}/{} PASS", set.passed, set.total);
}

fn percent(passed: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }

    passed as f64 * 100.0 / total as f64
}
