use std::path::PathBuf;

use clap::Parser;
use clap_verbosity_flag::InfoLevel;

use crate::config::{CompilerConfig, IndentStyle};

/// Compile PSP templates into Python servlet modules.
#[derive(Parser, Debug)]
#[command(name = "pspc", version)]
#[command(about = "Compile PSP templates into Python servlet modules")]
pub struct Cli {
    /// Templates to compile.
    #[arg(required_unless_present = "print_config")]
    pub files: Vec<PathBuf>,

    /// Directory the generated modules are written to. Defaults to the
    /// directory of each template.
    #[arg(short, long)]
    pub out_dir: Option<PathBuf>,

    /// Name of the generated class. Only valid with a single template.
    #[arg(long)]
    pub class_name: Option<String>,

    /// Print the generated module instead of writing it.
    #[arg(long)]
    pub stdout: bool,

    /// Directory relative include and insert paths resolve against.
    #[arg(long)]
    pub base_dir: Option<PathBuf>,

    /// Let closing delimiters be found past the end of an included file.
    #[arg(long)]
    pub compat_delimiters: bool,

    /// Default indent style: tabs, spaces or braces.
    #[arg(long, default_value_t = IndentStyle::Tabs, value_parser = parse_indent_style)]
    pub indent_type: IndentStyle,

    /// Default number of spaces per indentation level.
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u16).range(1..))]
    pub indent_spaces: u16,

    /// Keep whitespace-only text between script tags.
    #[arg(long)]
    pub no_gobble: bool,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    pub print_config: bool,

    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<InfoLevel>,
}

fn parse_indent_style(value: &str) -> Result<IndentStyle, String> {
    value.parse()
}

impl Cli {
    /// Compiler configuration described by the flags.
    pub fn config(&self) -> CompilerConfig {
        let mut builder = CompilerConfig::builder()
            .delimiters_cross_includes(self.compat_delimiters)
            .default_indent_style(self.indent_type)
            .default_indent_spaces(usize::from(self.indent_spaces))
            .gobble_whitespace(!self.no_gobble);
        if let Some(class_name) = &self.class_name {
            builder = builder.class_name(class_name.clone());
        }
        if let Some(base_dir) = &self.base_dir {
            builder = builder.base_dir(base_dir.clone());
        }
        builder.build()
    }
}
