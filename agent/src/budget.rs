use crate::fetch::{TRUNCATION_MARKER, truncate_chars};

pub const CHARS_PER_TOKEN: usize = 4;

/// Separator between scraped-content blocks.
pub const CONTENT_SEPARATOR: &str = "---\n\n";

/// Prefix that opens every per-topic findings block.
pub const TOPIC_HEADER: &str = "### Search topic ";

pub const RESULTS_OMITTED_MARKER: &str = "...(other results omitted)";

/// Line that opens the second-ranked result inside a findings block.
const SECOND_RESULT: &str = "\n[2]\n";

/// Rough token count at a fixed chars-per-token ratio. Undercounts CJK text.
pub fn approx_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

#[derive(Clone, Debug)]
pub struct Compactor {
    /// Fraction of the budget above which compaction starts.
    pub threshold: f64,
    /// Character cap for each scraped-content block in the first pass.
    pub block_chars: usize,
}

impl Default for Compactor {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            block_chars: 1000,
        }
    }
}

impl Compactor {
    fn over_budget(&self, findings: &str, content: &str, budget: usize) -> bool {
        (approx_tokens(findings) + approx_tokens(content)) as f64 > budget as f64 * self.threshold
    }

    /// Shrinks `findings` and `content` until they fit the budget or both
    /// passes have run. Block count and order are kept.
    pub fn compact(&self, findings: &str, content: &str, budget: usize) -> (String, String) {
        if !self.over_budget(findings, content, budget) {
            return (findings.to_string(), content.to_string());
        }

        let content = self.shorten_blocks(content);
        if !self.over_budget(findings, &content, budget) {
            return (findings.to_string(), content);
        }

        (first_results_only(findings), content)
    }

    fn shorten_blocks(&self, content: &str) -> String {
        let limit = self.block_chars + TRUNCATION_MARKER.chars().count();
        content
            .split(CONTENT_SEPARATOR)
            .map(|block| {
                // cutting a block only slightly over the cap would grow it
                if block.chars().count() > limit {
                    truncate_chars(block, self.block_chars).0
                } else {
                    block.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(CONTENT_SEPARATOR)
    }
}

fn first_results_only(findings: &str) -> String {
    let mut blocks = findings.split(TOPIC_HEADER);
    let mut shortened = vec![blocks.next().unwrap_or_default().to_string()];

    for block in blocks {
        match block.find(SECOND_RESULT) {
            Some(cut) if block[cut + 1..].chars().count() > RESULTS_OMITTED_MARKER.len() => {
                // keep the newline that ends the first result
                shortened.push(format!("{}{}", &block[..=cut], RESULTS_OMITTED_MARKER));
            }
            _ => shortened.push(block.to_string()),
        }
    }

    shortened.join(TOPIC_HEADER)
}

#[cfg(test)]
mod tests {
    use super::{
        CONTENT_SEPARATOR, Compactor, RESULTS_OMITTED_MARKER, TOPIC_HEADER, approx_tokens,
    };
    use crate::fetch::TRUNCATION_MARKER;

    fn findings(topics: usize, results: usize, description: &str) -> String {
        let mut text = String::new();
        for t in 1..=topics {
            text.push_str(&format!("{}{}: topic {}\n", TOPIC_HEADER, t, t));
            for r in 1..=results {
                text.push_str(&format!(
                    "[{}]\nTitle: result {}\nDescription: {}\nURL: https://{}.{}\n\n",
                    r, r, description, t, r
                ));
            }
            text.push('\n');
        }
        text
    }

    fn content(blocks: &[usize]) -> String {
        blocks
            .iter()
            .enumerate()
            .map(|(i, len)| format!("\n## Page {}\n{}\n\n{}", i, "c".repeat(*len), CONTENT_SEPARATOR))
            .collect()
    }

    #[test]
    fn test_approx_tokens_counts_chars() {
        assert_eq!(approx_tokens("abcdefgh"), 2);
        assert_eq!(approx_tokens("日本語のテキスト"), 2);
        assert_eq!(approx_tokens(""), 0);
    }

    #[test]
    fn test_under_budget_is_untouched() {
        let f = findings(2, 3, "short");
        let c = content(&[2000, 3000]);

        let (f2, c2) = Compactor::default().compact(&f, &c, 1_000_000);

        assert_eq!(f2, f);
        assert_eq!(c2, c);
    }

    #[test]
    fn test_first_pass_truncates_long_blocks_only() {
        let f = findings(1, 2, "d");
        let c = content(&[5000, 10, 4000]);

        // content alone estimates to ~2250 tokens; 0.7 * 2000 = 1400
        let (f2, c2) = Compactor::default().compact(&f, &c, 2000);

        assert_eq!(f2, f);
        let blocks: Vec<&str> = c2.split(CONTENT_SEPARATOR).collect();
        assert_eq!(blocks.len(), c.split(CONTENT_SEPARATOR).count());
        assert!(blocks[0].ends_with(TRUNCATION_MARKER));
        assert!(blocks[0].starts_with("\n## Page 0\n"));
        assert_eq!(blocks[1], "\n## Page 1\ncccccccccc\n\n");
        assert!(blocks[2].starts_with("\n## Page 2\n"));
        assert!(blocks[2].ends_with(TRUNCATION_MARKER));
        assert!(c2.len() < c.len());
    }

    #[test]
    fn test_second_pass_keeps_first_result_per_topic() {
        let f = findings(3, 4, &"x".repeat(400));
        let c = content(&[3000]);

        let (f2, c2) = Compactor::default().compact(&f, &c, 100);

        assert!(f2.len() < f.len());
        assert!(c2.len() < c.len());
        assert_eq!(f2.matches(TOPIC_HEADER).count(), 3);
        assert_eq!(f2.matches(RESULTS_OMITTED_MARKER).count(), 3);
        assert_eq!(f2.matches("[1]\n").count(), 3);
        assert!(!f2.contains("[2]\n"));

        let topics: Vec<usize> = (1..=3).map(|t| f2.find(&format!("topic {}", t)).unwrap()).collect();
        assert!(topics.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_compaction_is_stable() {
        let compactor = Compactor::default();
        let f = findings(4, 5, &"y".repeat(300));
        let c = content(&[4000, 200, 6000]);

        let once = compactor.compact(&f, &c, 500);
        let twice = compactor.compact(&once.0, &once.1, 500);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_never_grows_text() {
        let compactor = Compactor::default();
        // blocks right at the edge of the cap
        let c = content(&[1000, 1005, 1030]);
        let f = findings(2, 2, "");

        let (f2, c2) = compactor.compact(&f, &c, 1);

        assert!(f2.chars().count() <= f.chars().count());
        assert!(c2.chars().count() <= c.chars().count());
        assert_eq!(c2.split(CONTENT_SEPARATOR).count(), c.split(CONTENT_SEPARATOR).count());
    }
}
