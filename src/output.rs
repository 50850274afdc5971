use crate::error::AplcheckError;

/// Print rendered output to stdout, newline-terminated.
pub fn print_result(rendered: &str) {
    if rendered.ends_with('\n') {
        print!("{}", rendered);
    } else {
        println!("{}", rendered);
    }
}

/// Print error to stderr in the contract format: error: <category>: <message>
pub fn print_error(err: &AplcheckError) {
    eprintln!("error: {}", err);
}
