//! gitrun's binary entry point.
//!
//! All real logic lives in the library crate; this translates the result
//! into a process exit code (spec §6): 0 success, 1 a run completed with
//! failed actions, 2 a configuration/usage error, 130 cancelled.

fn main() {
    match gitrun::cli::run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("error: {e:?}");
            std::process::exit(2);
        }
    }
}
