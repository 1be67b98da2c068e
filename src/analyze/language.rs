//! Extension to language mapping

/// Language name for a lowercase extension including its leading dot.
pub fn language_for_extension(extension: &str) -> Option<&'static str> {
    let language = match extension {
        ".py" => "Python",
        ".js" | ".jsx" | ".mjs" | ".cjs" => "JavaScript",
        ".ts" | ".tsx" => "TypeScript",
        ".java" => "Java",
        ".cpp" | ".cc" | ".cxx" | ".hpp" => "C++",
        ".c" | ".h" => "C",
        ".cs" => "C#",
        ".go" => "Go",
        ".rs" => "Rust",
        ".php" => "PHP",
        ".rb" => "Ruby",
        ".swift" => "Swift",
        ".kt" => "Kotlin",
        ".scala" => "Scala",
        ".clj" => "Clojure",
        ".hs" => "Haskell",
        ".elm" => "Elm",
        ".ex" | ".exs" => "Elixir",
        ".dart" => "Dart",
        ".vue" => "Vue.js",
        ".svelte" => "Svelte",
        ".html" | ".htm" => "HTML",
        ".css" => "CSS",
        ".scss" => "SCSS",
        ".sass" => "Sass",
        ".less" => "Less",
        ".sql" => "SQL",
        ".json" => "JSON",
        ".yaml" | ".yml" => "YAML",
        ".toml" => "TOML",
        ".xml" => "XML",
        ".md" => "Markdown",
        ".sh" | ".bash" => "Shell",
        ".bat" => "Batch",
        ".ps1" => "PowerShell",
        ".dockerfile" => "Docker",
        ".tf" => "Terraform",
        ".r" => "R",
        _ => return None,
    };
    Some(language)
}
