//! Search benchmarks for performance profiling.
//!
//! Run with: `cargo bench -p mcts`
//!
//! These benchmarks measure:
//! - Full search with varying iteration budgets
//! - Thread scaling on one shared tree
//! - Game comparison (TicTacToe vs Connect4)
//! - Transposition table store/retrieve throughput

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use games_connect4::Connect4;
use games_tictactoe::TicTacToe;
use mcts::{
    Evaluator, EvaluatorFactory, SearchBudget, SearchConfig, Searcher, TranspositionTable,
    UniformEvaluator,
};

fn uniform_tictactoe() -> EvaluatorFactory<TicTacToe> {
    Arc::new(|_| -> Box<dyn Evaluator<TicTacToe>> { Box::new(UniformEvaluator::new()) })
}

fn uniform_connect4() -> EvaluatorFactory<Connect4> {
    Arc::new(|_| -> Box<dyn Evaluator<Connect4>> { Box::new(UniformEvaluator::new()) })
}

// =============================================================================
// Full Search Benchmarks
// =============================================================================

fn bench_search_iterations(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_iterations");

    for iterations in [50u64, 100, 200, 400, 800] {
        group.throughput(Throughput::Elements(iterations));
        group.bench_with_input(
            BenchmarkId::new("tictactoe", iterations),
            &iterations,
            |b, &iterations| {
                let searcher = Searcher::new(
                    Arc::new(TicTacToe::new()),
                    SearchConfig::for_testing(),
                    uniform_tictactoe(),
                )
                .unwrap();
                let position = games_tictactoe::Position::new();

                b.iter(|| {
                    black_box(
                        searcher
                            .select_move(&position, SearchBudget::by_iterations(iterations))
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Thread Scaling Benchmarks
// =============================================================================

fn bench_thread_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("search_threads");
    let iterations = 2_000u64;

    for threads in [1usize, 2, 4] {
        group.throughput(Throughput::Elements(iterations));
        group.bench_with_input(
            BenchmarkId::new("connect4", threads),
            &threads,
            |b, &threads| {
                let searcher = Searcher::new(
                    Arc::new(Connect4::new()),
                    SearchConfig::for_testing().with_threads(threads),
                    uniform_connect4(),
                )
                .unwrap();
                let position = games_connect4::Position::new();

                b.iter(|| {
                    black_box(
                        searcher
                            .select_move(&position, SearchBudget::by_iterations(iterations))
                            .unwrap(),
                    )
                });
            },
        );
    }

    group.finish();
}

// =============================================================================
// Game Comparison Benchmarks (TicTacToe vs Connect4)
// =============================================================================

fn bench_game_comparison(c: &mut Criterion) {
    let mut group = c.benchmark_group("game_comparison");
    let budget = SearchBudget::by_iterations(400);

    group.bench_function("tictactoe_400_iterations", |b| {
        let searcher = Searcher::new(
            Arc::new(TicTacToe::new()),
            SearchConfig::for_testing(),
            uniform_tictactoe(),
        )
        .unwrap();
        let position = games_tictactoe::Position::new();

        b.iter(|| black_box(searcher.select_move(&position, budget).unwrap()));
    });

    // Connect4 comparison (wider, deeper game)
    group.bench_function("connect4_400_iterations", |b| {
        let searcher = Searcher::new(
            Arc::new(Connect4::new()),
            SearchConfig::for_testing(),
            uniform_connect4(),
        )
        .unwrap();
        let position = games_connect4::Position::new();

        b.iter(|| black_box(searcher.select_move(&position, budget).unwrap()));
    });

    group.finish();
}

// =============================================================================
// Transposition Table Benchmarks
// =============================================================================

fn bench_table_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("transposition_table");

    group.bench_function("store", |b| {
        let table: TranspositionTable<f64> = TranspositionTable::new(12, 3);
        let mut key = 0x9E37_79B9_7F4A_7C15u64;
        b.iter(|| {
            key = key.wrapping_mul(0xBF58_476D_1CE4_E5B9).wrapping_add(1);
            table.store(key, black_box(0.25));
        });
    });

    group.bench_function("retrieve_hit", |b| {
        let table: TranspositionTable<f64> = TranspositionTable::new(12, 3);
        for i in 0..4096u64 {
            table.store(i.wrapping_mul(0x9E37_79B9_7F4A_7C15), i as f64 / 4096.0);
        }
        let mut i = 0u64;
        b.iter(|| {
            i = (i + 1) % 4096;
            black_box(table.retrieve(i.wrapping_mul(0x9E37_79B9_7F4A_7C15)))
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_search_iterations,
    bench_thread_scaling,
    bench_game_comparison,
    bench_table_operations,
);

criterion_main!(benches);
