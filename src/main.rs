use assay::{init_tracing, run};

fn main() {
    if let Err(e) = init_tracing() {
        eprintln!("warning: {e:#}");
    }
    if let Err(e) = run() {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
