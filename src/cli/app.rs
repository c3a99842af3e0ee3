use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "mobitool")]
#[command(about = "Kindle MOBI/AZW3 ebook inspection toolkit")]
#[command(version)]
pub struct Cli {
    /// Control colored output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Write output to a file instead of stdout
    #[arg(short, long, global = true)]
    pub output: Option<String>,

    /// Increase log verbosity (-v warn details, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Read the file through a memory map
    #[arg(long, global = true)]
    pub mmap: bool,

    /// For hybrid files, inspect the legacy KF7 part instead of KF8
    #[arg(long, global = true)]
    pub kf7: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ColorMode {
    Auto,
    Always,
    Never,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show PDB, record 0 and MOBI headers with capability flags
    Info {
        /// Path to the ebook file (.mobi, .azw, .azw3, .prc)
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show resolved book metadata (title, author, ASIN, language, ...)
    Meta {
        /// Path to the ebook file
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List EXTH metadata records in file order
    Exth {
        /// Path to the ebook file
        #[arg(short, long)]
        file: String,

        /// Only show records with this numeric tag
        #[arg(short, long)]
        tag: Option<u32>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List the PDB record directory with sizes and magics
    Records {
        /// Path to the ebook file
        #[arg(short, long)]
        file: String,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List entries of a KF8 or dictionary index
    Index {
        /// Path to the ebook file
        #[arg(short, long)]
        file: String,

        /// Index to show: skel, frag, ncx, guide, orth or infl
        #[arg(short, long, default_value = "ncx")]
        name: String,

        /// Show the raw tag values of every entry
        #[arg(long)]
        raw: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Hex dump of a single record
    Dump {
        /// Path to the ebook file
        #[arg(short, long)]
        file: String,

        /// Record number to dump (default: 0)
        #[arg(short, long)]
        record: Option<usize>,

        /// Number of bytes to dump (default: whole record)
        #[arg(short, long)]
        length: Option<usize>,

        /// Output raw binary bytes (no formatting)
        #[arg(long)]
        raw: bool,
    },

    /// Show the RAWML part table or extract parts to a directory
    Rawml {
        /// Path to the ebook file
        #[arg(short, long)]
        file: String,

        /// Write every part into this directory
        #[arg(short, long)]
        dir: Option<String>,

        /// Accepted text length shortfall in bytes (default: one text record)
        #[arg(long)]
        tolerance: Option<usize>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}
