//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use image_crawler_core::Provider;

/// Crawl image search engines for several keywords at once.
///
/// Candidate URLs for each keyword are read from
/// `<candidates_dir>/<engine>_<keyword>.txt`; images at least as large as the
/// configured minimum are saved under `<downloads_dir>/<engine>_<keyword>/`.
#[derive(Parser, Debug)]
#[command(name = "image-crawler")]
#[command(author, version, about)]
pub struct Args {
    /// Keywords to crawl, one task per keyword
    #[arg(short, long, num_args = 1.., required = true)]
    pub keywords: Vec<String>,

    /// Images to download per keyword [config default: 100]
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..=100_000))]
    pub num_images: Option<u64>,

    /// Maximum keywords crawled concurrently (1-100) [config default: 3]
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub max_workers: Option<u8>,

    /// Search engine to crawl (baidu, bing, google) [config default: baidu]
    #[arg(short, long)]
    pub engine: Option<Provider>,

    /// Leading candidates to discard per keyword
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Path to a config file (defaults to ~/.config/image-crawler/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Also write logs to a timestamped file under the logs directory
    #[arg(long)]
    pub log_to_file: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_keywords_are_required() {
        let err = Args::try_parse_from(["image-crawler"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_cli_multiple_keywords() {
        let args = Args::try_parse_from(["image-crawler", "--keywords", "cat", "red panda", "狗"]).unwrap();
        assert_eq!(args.keywords, vec!["cat", "red panda", "狗"]);
        assert_eq!(args.num_images, None);
        assert_eq!(args.max_workers, None);
        assert_eq!(args.engine, None);
        assert_eq!(args.skip, 0);
    }

    #[test]
    fn test_cli_engine_parses_provider() {
        let args = Args::try_parse_from(["image-crawler", "-k", "cat", "--engine", "bing"]).unwrap();
        assert_eq!(args.engine, Some(Provider::Bing));

        let err = Args::try_parse_from(["image-crawler", "-k", "cat", "--engine", "yandex"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_num_images_and_workers() {
        let args = Args::try_parse_from([
            "image-crawler",
            "-k",
            "cat",
            "--num-images",
            "50",
            "--max-workers",
            "8",
        ])
        .unwrap();
        assert_eq!(args.num_images, Some(50));
        assert_eq!(args.max_workers, Some(8));
    }

    #[test]
    fn test_cli_max_workers_range() {
        for value in ["0", "101"] {
            let err = Args::try_parse_from(["image-crawler", "-k", "cat", "-w", value]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        }
    }

    #[test]
    fn test_cli_num_images_zero_rejected() {
        let err = Args::try_parse_from(["image-crawler", "-k", "cat", "-n", "0"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_cli_verbose_flag_increments_count() {
        let args = Args::try_parse_from(["image-crawler", "-k", "cat", "-vv"]).unwrap();
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_cli_quiet_and_config() {
        let args = Args::try_parse_from(["image-crawler", "-k", "cat", "-q", "--config", "/tmp/c.toml"]).unwrap();
        assert!(args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn test_cli_help_flag_shows_usage() {
        let err = Args::try_parse_from(["image-crawler", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
