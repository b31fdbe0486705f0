//! The `psytest init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    if std::path::Path::new("psytest.toml").exists() {
        println!("psytest.toml already exists, skipping.");
    } else {
        std::fs::write("psytest.toml", SAMPLE_CONFIG)?;
        println!("Created psytest.toml");
    }

    std::fs::create_dir_all("banks")?;
    let example_path = std::path::Path::new("banks/example.toml");
    if example_path.exists() {
        println!("banks/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_BANK)?;
        println!("Created banks/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Run: psytest validate --bank banks/example.toml");
    println!("  2. Run: psytest import --bank banks/example.toml");
    println!("  3. Run: psytest take --test simulacro");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# psytest configuration

# One countdown period, in milliseconds, counts as one second of test time.
tick_ms = 1000
# seed = 42

[store]
type = "file"
dir = "./psytest-data"

# [store]
# type = "rest"
# base_url = "https://db.example.com"
# api_key = "${PSYTEST_API_KEY}"

[user]
id = "local"
role = "candidate"
"#;

const EXAMPLE_BANK: &str = r#"[bank]
id = "example"
name = "Example Bank"
description = "A small bank to get started"

[[blocks]]
id = "sinonimos"
category = "sinonimos"
name = "Sinónimos"
default_quantity = 3
time_limit_secs = 300

[[blocks]]
id = "series"
category = "series"
name = "Series numéricas"
default_quantity = 2
time_limit_secs = 240

[[blocks]]
id = "memoria"
category = "memoria"
name = "Memoria visual"
default_quantity = 1
kind = { type = "memory", stimulus_secs = 10, distraction_secs = 5, answer_secs = 20 }

[[questions]]
id = "syn-1"
category = "sinonimos"
prompt = "Synonym of 'rápido'"
format = "text"
options = ["veloz", "lento", "tardío", "quieto"]
correct_answer = 0

[[questions]]
id = "syn-2"
category = "sinonimos"
prompt = "Synonym of 'feliz'"
format = "text"
options = ["triste", "contento", "cansado", "serio"]
correct_answer = 1

[[questions]]
id = "syn-3"
category = "sinonimos"
prompt = "Synonym of 'antiguo'"
format = "text"
options = ["moderno", "nuevo", "viejo", "reciente"]
correct_answer = 2

[[questions]]
id = "syn-4"
category = "sinonimos"
prompt = "Synonym of 'valiente'"
format = "flagged"
answers = [
    { text = "cobarde", is_correct = false },
    { text = "temeroso", is_correct = false },
    { text = "audaz", is_correct = true },
]

[[questions]]
id = "ser-1"
category = "series"
prompt = "2, 4, 8, 16, ?"
format = "text"
options = ["24", "32", "30"]
correct_answer = 1

[[questions]]
id = "ser-2"
category = "series"
prompt = "1, 1, 2, 3, 5, ?"
format = "text"
options = ["7", "8", "9"]
correct_answer = 1

[[questions]]
id = "ser-3"
category = "series"
prompt = "3, 6, 9, 12, ?"
format = "text"
options = ["15", "14", "18"]
correct_answer = 0

[[questions]]
id = "mem-1"
category = "memoria"
prompt = "Which figure was shown?"
image = "https://example.com/figures/stimulus-1.png"
format = "image"
images = ["circle.png", "square.png", "triangle.png"]
correct_image_index = 2

[[questions]]
id = "mem-2"
category = "memoria"
prompt = "Which figure was shown?"
image = "https://example.com/figures/stimulus-2.png"
format = "image"
images = ["star.png", "hexagon.png", "circle.png"]
correct_image_index = 0

[[tests]]
id = "simulacro"
name = "Simulacro"
description = "Every block in order, each with its own timer"

[[tests.blocks]]
block = "sinonimos"

[[tests.blocks]]
block = "series"

[[tests.blocks]]
block = "memoria"

[[tests]]
id = "repaso"
name = "Repaso rápido"
description = "Mixed questions under one ten-minute timer"
kind = "custom"
timing = { mode = "whole", time_limit_secs = 600 }
scoring = { type = "capped", points_per_correct = 2.5, max_grade = 10.0 }

[[tests.blocks]]
block = "sinonimos"
quantity = 2

[[tests.blocks]]
block = "series"
quantity = 2
"#;
