use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "amnesia-reader",
    about = "Search PDF text layers and EPUB sections the way the reader does",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search a PDF text layer (JSON array of page text content)
    Pdf {
        /// Path to the text-layer JSON
        text_layer: PathBuf,

        /// Query to search for
        query: String,

        /// Navigate to this match and report the outcome
        #[arg(short, long)]
        navigate: Option<usize>,
    },

    /// Search EPUB section documents, in spine order
    Epub {
        /// XHTML section files
        #[arg(required = true)]
        sections: Vec<PathBuf>,

        /// Query to search for
        #[arg(short, long)]
        query: String,

        /// Navigate to this match and report the outcome
        #[arg(short, long)]
        navigate: Option<usize>,
    },
}
