//! envstrap binary. With no arguments it runs the built-in plan.

fn main() {
    if let Err(e) = envstrap::run_cli() {
        eprintln!("Error: {e:#}");
        std::process::exit(envstrap::exit_code(&e));
    }
}
