//! Framework and layout detection
//!
//! Matches the analyzed tree against marker files for common frameworks.
//! A framework is reported when at least half of its markers are present.

use ingest_model::StructurePattern;

/// Marker forms:
/// - `name` matches a file with that name at any depth
/// - `a/b` matches that file relative to the project root
/// - `dir/` matches a directory relative to the project root
/// - `*.ext` matches any file with that suffix
const FRAMEWORK_MARKERS: &[(&str, &[&str])] = &[
    ("React", &["package.json", "src/App.js", "src/App.tsx", "public/index.html"]),
    ("Vue.js", &["package.json", "src/App.vue", "vue.config.js"]),
    ("Angular", &["package.json", "angular.json", "src/app/app.module.ts"]),
    ("Django", &["manage.py", "settings.py", "urls.py", "requirements.txt"]),
    ("Flask", &["app.py", "requirements.txt", "templates/"]),
    ("FastAPI", &["main.py", "requirements.txt", "app/"]),
    ("Spring Boot", &["pom.xml", "src/main/java/", "application.properties"]),
    ("Express.js", &["package.json", "server.js", "app.js"]),
    ("Next.js", &["package.json", "next.config.js", "pages/"]),
    ("Nuxt.js", &["package.json", "nuxt.config.js", "pages/"]),
    ("Laravel", &["composer.json", "artisan", "app/Http/"]),
    ("Ruby on Rails", &["Gemfile", "config/routes.rb", "app/controllers/"]),
    ("ASP.NET Core", &["*.csproj", "Program.cs", "Startup.cs"]),
    ("Gatsby", &["package.json", "gatsby-config.js", "src/pages/"]),
    ("Svelte", &["package.json", "src/App.svelte", "rollup.config.js"]),
    ("Cargo", &["Cargo.toml"]),
];

/// Files and directories of one project, as forward-slash paths relative
/// to the project root
#[derive(Debug, Default)]
pub struct ProjectLayout {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

impl ProjectLayout {
    /// Re-anchor every path below `prefix`, dropping the rest.
    pub fn rebased(self, prefix: &str) -> Self {
        let strip = |paths: Vec<String>| -> Vec<String> {
            paths
                .into_iter()
                .filter_map(|p| p.strip_prefix(prefix)?.strip_prefix('/').map(str::to_string))
                .collect()
        };
        Self {
            files: strip(self.files),
            dirs: strip(self.dirs),
        }
    }

    fn has_marker(&self, marker: &str) -> bool {
        if let Some(suffix) = marker.strip_prefix('*') {
            return self.files.iter().any(|f| f.ends_with(suffix));
        }
        if let Some(dir) = marker.strip_suffix('/') {
            return self.dirs.iter().any(|d| d == dir);
        }
        if marker.contains('/') {
            return self.files.iter().any(|f| f == marker);
        }
        self.files
            .iter()
            .any(|f| f.rsplit('/').next() == Some(marker))
    }

    fn has_top_level_dir(&self, names: &[&str]) -> bool {
        self.dirs
            .iter()
            .any(|d| !d.contains('/') && names.iter().any(|n| d.eq_ignore_ascii_case(n)))
    }
}

/// Frameworks whose markers are at least half present, in table order
pub fn detect_frameworks(layout: &ProjectLayout) -> Vec<String> {
    FRAMEWORK_MARKERS
        .iter()
        .filter(|(_, markers)| {
            let found = markers.iter().filter(|m| layout.has_marker(m)).count();
            found * 2 >= markers.len()
        })
        .map(|(name, _)| name.to_string())
        .collect()
}

/// Conventional top-level directories present in the project
pub fn structure_patterns(layout: &ProjectLayout) -> Vec<StructurePattern> {
    let mut patterns = Vec::new();
    if layout.has_top_level_dir(&["src"]) {
        patterns.push(StructurePattern::SourceDirectory);
    }
    if layout.has_top_level_dir(&["test", "tests"]) {
        patterns.push(StructurePattern::TestDirectory);
    }
    if layout.has_top_level_dir(&["docs", "documentation"]) {
        patterns.push(StructurePattern::DocumentationDirectory);
    }
    patterns
}
