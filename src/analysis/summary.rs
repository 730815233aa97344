// Tree summary serialization and transcript line numbering
//
// The collaborator gets an indented depth-first summary of what already
// exists instead of the raw source text, plus [N]-numbered lines for the
// span it is asked to analyze.

use crate::database::models::ClaimTreeNode;

/// Serialize the existing statement tree as an indented depth-first
/// summary: `- [type] speaker: text`
pub fn summarize_tree(nodes: &[ClaimTreeNode]) -> String {
    if nodes.is_empty() {
        return "(none yet)".to_string();
    }
    let mut out = String::new();
    summarize_into(nodes, 0, &mut out);
    out
}

fn summarize_into(nodes: &[ClaimTreeNode], depth: usize, out: &mut String) {
    for node in nodes {
        for _ in 0..depth {
            out.push_str("  ");
        }
        out.push_str(&format!(
            "- [{}] {}: {}\n",
            node.claim_type, node.speaker, node.text,
        ));
        if !node.children.is_empty() {
            summarize_into(&node.children, depth + 1, out);
        }
    }
}

/// Number non-empty lines as `[N] text`, starting at `offset + 1`.
/// Returns the numbered text and the last index assigned (equal to
/// `offset` when the input has no non-empty lines).
pub fn number_lines(text: &str, offset: i64) -> (String, i64) {
    let mut out = String::new();
    let mut index = offset;
    for line in text.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        index += 1;
        out.push_str(&format!("[{}] {}\n", index, line));
    }
    (out, index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: &str, speaker: &str, text: &str, children: Vec<ClaimTreeNode>) -> ClaimTreeNode {
        ClaimTreeNode {
            claim_id: 0,
            speaker: speaker.to_string(),
            text: text.to_string(),
            claim_type: kind.to_string(),
            line_index: None,
            children,
        }
    }

    #[test]
    fn test_summarize_empty_tree() {
        assert_eq!(summarize_tree(&[]), "(none yet)");
    }

    #[test]
    fn test_summarize_nested_tree() {
        let tree = vec![node(
            "claim",
            "Alex",
            "AI will replace jobs",
            vec![node("rebuttal", "Jordan", "Not all jobs", Vec::new())],
        )];

        let summary = summarize_tree(&tree);
        assert_eq!(
            summary,
            "- [claim] Alex: AI will replace jobs\n  - [rebuttal] Jordan: Not all jobs\n",
        );
    }

    #[test]
    fn test_number_lines_with_offset() {
        let (numbered, last) = number_lines("first\n\nsecond\n", 4);
        assert_eq!(numbered, "[5] first\n[6] second\n");
        assert_eq!(last, 6);
    }

    #[test]
    fn test_number_lines_empty() {
        let (numbered, last) = number_lines("\n  \n", 10);
        assert!(numbered.is_empty());
        assert_eq!(last, 10);
    }
}
