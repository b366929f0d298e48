use clap::{Args, Parser, Subcommand};
use cropsheet_core::AppConfig;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cropsheet")]
#[command(about = "Crop labeled boxes from a CVAT export into a spreadsheet report")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Correlate points to boxes, crop matches, and write output.xlsx
    Process(ProcessArgs),
    /// Print per-image box/point counts of the annotation export
    Inspect(SourceArgs),
    /// Render annotated review images for every image into rec/
    Visualize(SourceArgs),
    /// Print configuration values
    PrintConfig,
}

#[derive(Debug, Args)]
pub struct SourceArgs {
    /// Data folder containing images/ (overrides config)
    #[arg(long)]
    pub data_root: Option<PathBuf>,
    /// Annotation XML, relative to the data folder unless absolute
    #[arg(long)]
    pub annotations: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Brand list workbook, relative to the data folder unless absolute
    #[arg(long)]
    pub brands: Option<PathBuf>,
    /// Without a brand list, crop every box instead of matching points
    #[arg(long)]
    pub by_brands: bool,
    /// Skip rendering annotated review images
    #[arg(long)]
    pub no_visualize: bool,
}

impl SourceArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(data_root) = &self.data_root {
            config.data_root = data_root.clone();
        }
        if let Some(annotations) = &self.annotations {
            config.annotations_file = annotations.clone();
        }
    }
}

impl ProcessArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        self.source.apply(config);
        if let Some(brands) = &self.brands {
            config.brands_file = brands.clone();
        }
        if self.by_brands {
            config.process_by_brands = true;
        }
        if self.no_visualize {
            config.visualize = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_flags_override_config() {
        let cli = Cli::parse_from([
            "cropsheet",
            "process",
            "--data-root",
            "/srv/run",
            "--brands",
            "list.xlsx",
            "--by-brands",
            "--no-visualize",
        ]);
        let Some(Commands::Process(args)) = cli.command else {
            panic!("expected process subcommand");
        };

        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.data_root, PathBuf::from("/srv/run"));
        assert_eq!(config.brands_path(), PathBuf::from("/srv/run/list.xlsx"));
        assert!(config.process_by_brands);
        assert!(!config.visualize);
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let cli = Cli::parse_from(["cropsheet", "inspect"]);
        let Some(Commands::Inspect(args)) = cli.command else {
            panic!("expected inspect subcommand");
        };

        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.data_root, PathBuf::from("data"));
        assert_eq!(config.annotations_file, PathBuf::from("annotations.xml"));
    }
}
