// main.rs

fn main() {
    if let Err(err) = ebook_reader_lib::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
