use chime_core::{Cart, UserDetails};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, Table};
use console::{style, Emoji};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

pub fn print_banner() {
    println!();
    println!("{}", style("  Chime  ").bold().white().on_cyan());
    println!("{}", style("  Courses, robots and checkout from the terminal  ").dim());
    println!();
}

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const UPLOAD_TEMPLATE: &str =
    "{spinner:.green} {msg:>24!} [{bar:32.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})";

/// Bar or spinner with the given template; `len` of `None` makes a spinner.
fn styled_bar(len: Option<u64>, template: &str, message: &str) -> ProgressBar {
    let (pb, base) = match len {
        Some(len) => (ProgressBar::new(len), ProgressStyle::default_bar()),
        None => (ProgressBar::new_spinner(), ProgressStyle::default_spinner()),
    };
    let style = base
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .tick_chars("⠁⠃⠇⡇⣇⣧⣷⣿ ")
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn create_spinner(message: &str) -> ProgressBar {
    styled_bar(None, SPINNER_TEMPLATE, message)
}

pub fn create_upload_pb(total_size: u64, file_name: &str) -> ProgressBar {
    styled_bar(Some(total_size), UPLOAD_TEMPLATE, file_name)
}

#[derive(Clone, Copy)]
enum Tone {
    Success,
    Warning,
    Failure,
}

fn status_line(tone: Tone, message: &str) {
    match tone {
        Tone::Success => println!("{} {}", Emoji("✔", "ok"), style(message).green()),
        Tone::Warning => println!("{} {}", Emoji("⚠", "!!"), style(message).yellow()),
        Tone::Failure => eprintln!("{} {}", Emoji("✖", "error:"), style(message).red().bold()),
    }
}

pub fn print_success(message: &str) {
    status_line(Tone::Success, message);
}

pub fn print_warning(message: &str) {
    status_line(Tone::Warning, message);
}

pub fn print_error(message: &str) {
    status_line(Tone::Failure, message);
}

pub fn print_user(details: &UserDetails, country: &str) {
    println!("  {} {}", style("Name:").bold(), details.full_name());
    if !details.address.is_empty() {
        println!("  {} {}", style("Address:").bold(), details.address);
    }
    println!("  {} {}", style("Country:").bold(), country);
}

pub fn print_cart(cart: &Cart) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(comfy_table::ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Product").add_attribute(Attribute::Bold).fg(Color::Cyan),
        Cell::new("Price").add_attribute(Attribute::Bold).fg(Color::Green),
    ]);

    for product in &cart.products {
        let price = match &product.price {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(value) => value.to_string(),
            None => "-".to_string(),
        };
        table.add_row(vec![Cell::new(&product.title), Cell::new(price)]);
    }

    println!("{table}");
    if let Some(total) = cart.total_amount {
        println!("  {} {:.2}", style("Total:").bold(), total);
    }
}
