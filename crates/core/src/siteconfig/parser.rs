use crate::error::{FolioError, Result};
use crate::siteconfig::directives::{SiteConfig, parse_directive};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Site rule file parser
#[derive(Debug)]
pub struct ConfigParser;

impl ConfigParser {
    /// Parse a single rule file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<SiteConfig> {
        let file = std::fs::File::open(&path).map_err(|e| {
            FolioError::SiteConfigError(format!("Cannot open file {}: {}", path.as_ref().display(), e))
        })?;

        let reader = BufReader::new(file);
        Self::parse_reader(reader)
    }

    /// Parse rules from a reader
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<SiteConfig> {
        let mut config = SiteConfig::new();

        for (index, line) in reader.lines().enumerate() {
            let line_number = index + 1;
            let line =
                line.map_err(|e| FolioError::SiteConfigError(format!("Read error at line {}: {}", line_number, e)))?;
            Self::parse_line(&mut config, &line, line_number)?;
        }

        Ok(config)
    }

    /// Parse rules from a string
    pub fn parse_string(content: &str) -> Result<SiteConfig> {
        let mut config = SiteConfig::new();

        for (index, line) in content.lines().enumerate() {
            Self::parse_line(&mut config, line, index + 1)?;
        }

        Ok(config)
    }

    fn parse_line(config: &mut SiteConfig, line: &str, line_number: usize) -> Result<()> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return Ok(());
        }

        match parse_directive(line) {
            Ok(Some(directive)) => config.add_directive(directive),
            Ok(None) => {}
            Err(e) => {
                return Err(FolioError::SiteConfigError(format!("Parse error at line {}: {}", line_number, e)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_string_basic() {
        let content = r#"
# Example config
title: //h1[@class='title']
body: //div[@id='content']
strip: //div[@class='sidebar']
tidy: yes
"#;

        let config = ConfigParser::parse_string(content).unwrap();

        assert_eq!(config.title, vec!["//h1[@class='title']"]);
        assert_eq!(config.body, vec!["//div[@id='content']"]);
        assert_eq!(config.strip, vec!["//div[@class='sidebar']"]);
        assert_eq!(config.tidy, Some(true));
    }

    #[test]
    fn test_parse_string_multiple_directives() {
        let content = r#"
title: //h1
title: //meta[@property='og:title']/@content
body: //article
body: //div[@class='post-body']
strip_id_or_class: sidebar
strip_id_or_class: advertisement
"#;

        let config = ConfigParser::parse_string(content).unwrap();

        assert_eq!(config.title.len(), 2);
        assert_eq!(config.body.len(), 2);
        assert_eq!(config.strip_id_or_class.len(), 2);
    }

    #[test]
    fn test_parse_string_http_headers() {
        let content = r#"
http_header(User-Agent): Mozilla/5.0 (compatible; Folio/1.0)
http_header(Cookie): euConsent=true
"#;

        let config = ConfigParser::parse_string(content).unwrap();

        assert_eq!(config.http_header.len(), 2);
        assert_eq!(config.header("user-agent"), Some("Mozilla/5.0 (compatible; Folio/1.0)"));
        assert_eq!(config.header("cookie"), Some("euConsent=true"));
    }

    #[test]
    fn test_parse_string_text_replacement() {
        let content = r#"
find_string: <p />
replace_string: <br /><br />
replace_string(<hr>): <br>
"#;

        let config = ConfigParser::parse_string(content).unwrap();

        assert_eq!(config.replacements(), Some(vec![("<p />", "<br /><br />"), ("<hr>", "<br>")]));
    }

    #[test]
    fn test_parse_reader() {
        let content = r#"
title: //h1
body: //article
"#;

        let cursor = Cursor::new(content);
        let config = ConfigParser::parse_reader(cursor).unwrap();

        assert_eq!(config.title.len(), 1);
        assert_eq!(config.body.len(), 1);
    }

    #[test]
    fn test_parse_invalid_directive_reports_line() {
        let content = "title: //h1\n\ninvalid_directive_without_colon";

        let err = ConfigParser::parse_string(content).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }

    #[test]
    fn test_parse_skips_unknown_commands() {
        let config = ConfigParser::parse_string("wrap_in(div): //p\nbody: //article").unwrap();
        assert_eq!(config.body, vec!["//article"]);
    }

    #[test]
    fn test_parse_empty_and_comments() {
        let content = r#"
# This is a comment
# Another comment

title: //h1

# Final comment
"#;

        let config = ConfigParser::parse_string(content).unwrap();

        assert_eq!(config.title, vec!["//h1"]);
    }

    #[test]
    fn test_parse_file_missing() {
        assert!(ConfigParser::parse_file("/nonexistent/folio/site.txt").is_err());
    }
}
