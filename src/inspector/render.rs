use chrono::Local;
use colored::Colorize;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, Table};

use crate::capture::CapturedRequest;
use crate::http::Status;

fn method_color(method: &str) -> Option<Color> {
    match method.to_uppercase().as_str() {
        "GET" => Some(Color::Green),
        "POST" => Some(Color::Blue),
        "PUT" => Some(Color::Yellow),
        "DELETE" => Some(Color::Red),
        _ => None,
    }
}

fn status_color(status: Status) -> Color {
    if status.is_success() {
        Color::Green
    } else if status.code() >= 400 {
        Color::Red
    } else {
        Color::Yellow
    }
}

/// 主列表：一行一个请求，顺序与传入一致
pub fn render_list(records: &[&CapturedRequest], total: usize, color: bool) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Method", "Status", "URL", "Time", "Duration"]);

    for (index, record) in records.iter().enumerate() {
        let status = Status::new(record.response_status);
        let mut method = Cell::new(&record.method);
        let mut status_cell = Cell::new(status.code());
        let mut url = Cell::new(&record.url);
        if color {
            if let Some(c) = method_color(&record.method) {
                method = method.fg(c);
            }
            status_cell = status_cell.fg(status_color(status));
            url = url.add_attribute(Attribute::Dim);
        }

        table.add_row(vec![
            Cell::new(index + 1),
            method,
            status_cell,
            url,
            Cell::new(record.timestamp.with_timezone(&Local).format("%H:%M:%S")),
            Cell::new(format!("{}ms", record.duration)),
        ]);
    }

    format!("{} requests ({} shown)\n{}", total, records.len(), table)
}

/// 详情：请求/响应的头和体，错误单独高亮
pub fn render_detail(record: &CapturedRequest, color: bool) -> String {
    let mut output = Vec::new();

    let status = Status::new(record.response_status);
    let title = format!("{} {} -> {}", record.method, record.url, status);
    if color {
        let colored_title = if status.is_success() {
            title.green().bold()
        } else if status.is_client_error() {
            title.yellow().bold()
        } else {
            title.red().bold()
        };
        output.push(colored_title.to_string());
    } else {
        output.push(title);
    }

    let timing = format!(
        "Started: {} · {}ms",
        record.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
        record.duration
    );
    output.push(if color { timing.cyan().to_string() } else { timing });

    let sections = [
        ("Request Headers", pretty(&record.request_headers)),
        ("Request Body", pretty(&record.request_body)),
        ("Response Headers", pretty(&record.response_headers)),
        ("Response Body", pretty(&record.response_body)),
    ];
    for (heading, body) in sections {
        output.push(String::new());
        output.push(if color {
            format!("{}:", heading).blue().bold().to_string()
        } else {
            format!("{}:", heading)
        });
        output.push(body);
    }

    if let Some(error) = &record.error {
        output.push(String::new());
        if color {
            output.push("Error:".red().bold().to_string());
            output.push(error.red().to_string());
        } else {
            output.push("Error:".to_string());
            output.push(error.clone());
        }
    }

    output.join("\n")
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "<unprintable>".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Headers, InFlight};
    use serde_json::json;

    #[test]
    fn test_list_contains_rows() {
        let a = InFlight::open("GET", "https://a.com/x").complete(200, Headers::new(), json!(null));
        let b = InFlight::open("POST", "https://b.com/y").fail("refused");
        let output = render_list(&[&a, &b], 5, false);

        assert!(output.starts_with("5 requests (2 shown)"));
        assert!(output.contains("https://a.com/x"));
        assert!(output.contains("POST"));
    }

    #[test]
    fn test_detail_pretty_prints_json() {
        let mut in_flight = InFlight::open("GET", "https://a.com/x");
        in_flight.set_request_header("Accept", "application/json");
        let record = in_flight.complete(200, Headers::new(), json!({"ok": true}));

        let output = render_detail(&record, false);
        assert!(output.contains("GET https://a.com/x -> 200 OK"));
        assert!(output.contains("\"accept\": \"application/json\""));
        assert!(output.contains("Response Body:\n{\n  \"ok\": true\n}"));
        assert!(!output.contains("Error:"));
    }

    #[test]
    fn test_detail_shows_error() {
        let record = InFlight::open("GET", "https://a.com/x").fail("connection refused");
        let output = render_detail(&record, false);
        assert!(output.contains("-> 0 Network Error"));
        assert!(output.contains("Error:\nconnection refused"));
    }
}
