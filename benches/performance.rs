use pure_compose::{ComposerConfig, ContentFlags, EditorSession, Mode, Path};
use std::time::{Duration, Instant};

/// Performance benchmark suite for composer editing operations
///
/// Run with: cargo test --release --bench performance -- --nocapture
///
/// This measures:
/// - Mode switches with their quoting reflow
/// - Plain-text rendering of outgoing content
/// - Typing with undo coalescing
/// - Undo and redo of whole-document records
/// - Re-wrapping long paragraphs
const SMALL_DOC_PARAGRAPHS: usize = 10;
const MEDIUM_DOC_PARAGRAPHS: usize = 100;
const LARGE_DOC_PARAGRAPHS: usize = 1000;

const ITERATIONS: usize = 100;

const SAMPLE_WORDS: [&str; 24] = [
    "Lorem",
    "ipsum",
    "dolor",
    "sit",
    "amet",
    "consectetur",
    "adipiscing",
    "elit",
    "sed",
    "do",
    "eiusmod",
    "tempor",
    "incididunt",
    "ut",
    "labore",
    "et",
    "dolore",
    "magna",
    "aliqua",
    "enim",
    "minim",
    "veniam",
    "quis",
    "nostrud",
];

fn sentence(seed: usize, words: usize) -> String {
    (0..words)
        .map(|index| SAMPLE_WORDS[(seed * 7 + index) % SAMPLE_WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Create reply markup: every fourth paragraph is quoted, every tenth is a list
fn create_test_markup(num_paragraphs: usize, avg_words_per_para: usize) -> String {
    let mut markup = String::new();
    for i in 0..num_paragraphs {
        let text = sentence(i, avg_words_per_para);
        match i % 10 {
            3 | 7 => markup.push_str(&format!(
                "<blockquote type=\"cite\"><div>{text}</div><div>{text}</div></blockquote>"
            )),
            9 => markup.push_str(&format!("<ul><li>{text}</li><li><b>{text}</b></li></ul>")),
            5 => markup.push_str("<div><br></div>"),
            _ => markup.push_str(&format!("<div>{text} <i>{text}</i></div>")),
        }
    }
    markup
}

fn create_session(num_paragraphs: usize) -> EditorSession {
    EditorSession::from_markup(&create_test_markup(num_paragraphs, 20), ComposerConfig::default())
        .expect("generated markup parses")
}

fn documents() -> Vec<(&'static str, usize)> {
    vec![
        ("Small (10 paras)", SMALL_DOC_PARAGRAPHS),
        ("Medium (100 paras)", MEDIUM_DOC_PARAGRAPHS),
        ("Large (1000 paras)", LARGE_DOC_PARAGRAPHS),
    ]
}

struct BenchmarkResult {
    name: String,
    iterations: usize,
    total_duration: Duration,
    avg_duration: Duration,
    min_duration: Duration,
    max_duration: Duration,
}

impl BenchmarkResult {
    fn print(&self) {
        println!("\n{}", "=".repeat(70));
        println!("Benchmark: {}", self.name);
        println!("{}", "=".repeat(70));
        println!("Iterations:     {}", self.iterations);
        println!("Total time:     {:?}", self.total_duration);
        println!("Average:        {:?}", self.avg_duration);
        println!("Min:            {:?}", self.min_duration);
        println!("Max:            {:?}", self.max_duration);
        println!(
            "Ops/sec:        {:.2}",
            1_000_000.0 / self.avg_duration.as_micros().max(1) as f64
        );

        if self.avg_duration.as_millis() > 100 {
            println!("\n⚠️  WARNING: Average duration > 100ms (user-perceptible lag)");
        } else if self.avg_duration.as_millis() > 16 {
            println!("\n⚠️  WARNING: Average duration > 16ms (may drop frames)");
        }
    }
}

fn benchmark<F>(name: &str, iterations: usize, mut f: F) -> BenchmarkResult
where
    F: FnMut(),
{
    let mut durations = Vec::with_capacity(iterations);

    // Warmup
    for _ in 0..10 {
        f();
    }

    for _ in 0..iterations {
        let start = Instant::now();
        f();
        durations.push(start.elapsed());
    }

    let total_duration: Duration = durations.iter().sum();
    let avg_duration = total_duration / iterations as u32;
    let min_duration = *durations.iter().min().unwrap();
    let max_duration = *durations.iter().max().unwrap();

    BenchmarkResult {
        name: name.to_string(),
        iterations,
        total_duration,
        avg_duration,
        min_duration,
        max_duration,
    }
}

#[test]
fn bench_load_markup() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              LOAD MARKUP BENCHMARKS                            ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, paragraphs) in documents() {
        let markup = create_test_markup(paragraphs, 20);
        let mut session = EditorSession::new(ComposerConfig::default());
        let result = benchmark(&format!("load_markup - {}", name), ITERATIONS, || {
            session.load_markup(&markup).unwrap();
        });
        result.print();
    }
}

#[test]
fn bench_mode_switch() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              MODE SWITCH BENCHMARKS                            ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!("\nEach iteration converts to plain text and back, quoting included.");

    for (name, paragraphs) in documents() {
        let mut session = create_session(paragraphs);
        let result = benchmark(&format!("set_mode round trip - {}", name), ITERATIONS, || {
            session.set_mode(Mode::PlainText).unwrap();
            session.set_mode(Mode::Html).unwrap();
        });
        result.print();
    }
}

#[test]
fn bench_plain_text_output() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              PLAIN-TEXT OUTPUT BENCHMARKS                      ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, paragraphs) in documents() {
        let mut session = create_session(paragraphs);
        session.set_mode(Mode::PlainText).unwrap();
        let result = benchmark(&format!("get_content(TO_SEND_PLAIN) - {}", name), ITERATIONS, || {
            let outputs = session.get_content(ContentFlags::TO_SEND_PLAIN).unwrap();
            assert!(outputs.to_send_plain.is_some());
        });
        result.print();
    }
}

#[test]
fn bench_typing() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              TYPING BENCHMARKS                                 ║");
    println!("╚════════════════════════════════════════════════════════════════╝");
    println!("\nThis simulates the full cost of typing a character:");
    println!("  1. Claim the paragraph and snapshot it");
    println!("  2. Insert the character");
    println!("  3. Coalesce with the previous typing step");

    for (name, paragraphs) in documents() {
        let mut session = create_session(paragraphs);
        session.collapse_to(&Path::new(vec![0, 0]), 0).unwrap();
        let result = benchmark(&format!("type_text - {}", name), ITERATIONS, || {
            session.type_text("x").unwrap();
        });
        result.print();
        println!("Undo depth after typing: {}", session.history().undo_depth());
    }
}

#[test]
fn bench_undo_redo() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              UNDO / REDO BENCHMARKS                            ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for (name, paragraphs) in documents() {
        let mut session = create_session(paragraphs);
        session.set_mode(Mode::PlainText).unwrap();
        let result = benchmark(&format!("undo + redo of a mode switch - {}", name), ITERATIONS, || {
            assert!(session.undo().unwrap());
            assert!(session.redo().unwrap());
        });
        result.print();
    }
}

#[test]
fn bench_wrap_selection() {
    println!("\n\n╔════════════════════════════════════════════════════════════════╗");
    println!("║              WRAP SELECTION BENCHMARKS                         ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    for words in [50, 500, 5000] {
        let markup = format!("<div>{}</div>", sentence(1, words));
        let mut session = EditorSession::from_markup(&markup, ComposerConfig::default()).unwrap();
        let result = benchmark(&format!("wrap_selection - {} words", words), ITERATIONS, || {
            session.select_node_contents(&Path::new(vec![0])).unwrap();
            session.wrap_selection().unwrap();
            session.undo().unwrap();
        });
        result.print();
    }
}
