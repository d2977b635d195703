//! 系统 Prompt 构建：按记忆类型分段拼入相关记忆

use crate::memory::{Memory, MemoryKind};

pub const DEFAULT_ROLE: &str =
    "You are an AI Sales Representative. Use memories and context to have natural sales conversations.";

fn section(title: &str, memories: &[Memory], kind: MemoryKind, limit: usize) -> String {
    let blocks: Vec<String> = memories
        .iter()
        .filter(|m| m.kind == kind)
        .take(limit)
        .map(Memory::to_prompt_block)
        .collect();
    format!("## {}:\n{}\n", title, blocks.join("\n"))
}

/// 角色 + 分类记忆 + 行为准则
pub fn build_system_prompt(
    role: &str,
    memories: &[Memory],
    limit: usize,
    resume_marker: &str,
) -> String {
    let mut s = String::new();
    s.push_str(role);
    s.push_str("\n\n## Memories:\n");
    s.push_str(&section("Recent Objections", memories, MemoryKind::Objection, limit));
    s.push('\n');
    s.push_str(&section("Successful Responses", memories, MemoryKind::Response, limit));
    s.push('\n');
    s.push_str(&section("Background Information", memories, MemoryKind::Background, limit));
    s.push('\n');
    s.push_str(&section("Recent Interruptions", memories, MemoryKind::Interruption, limit));
    s.push_str("\n## Guidelines:\n");
    s.push_str("- Listen actively for objections and interruptions\n");
    s.push_str("- Use past interaction context to improve responses\n");
    s.push_str("- Maintain a professional and empathetic tone\n");
    s.push_str("- Know when to escalate to human sales rep\n");
    s.push_str(&format!(
        "- When the presentation should continue, end your reply with {resume_marker}\n"
    ));
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sections_group_by_kind_and_respect_limit() {
        let memories = vec![
            Memory::new(MemoryKind::Objection, "o1"),
            Memory::new(MemoryKind::Objection, "o2"),
            Memory::new(MemoryKind::Response, "r1"),
            Memory::new(MemoryKind::Sentiment, "ignored"),
        ];
        let prompt = build_system_prompt(DEFAULT_ROLE, &memories, 1, "RESUME_VIDEO");
        assert!(prompt.starts_with(DEFAULT_ROLE));
        assert!(prompt.contains("## Recent Objections:\nType: objection\nContent: o1"));
        assert!(!prompt.contains("Content: o2"));
        assert!(prompt.contains("Content: r1"));
        assert!(!prompt.contains("ignored"));
        assert!(prompt.contains("end your reply with RESUME_VIDEO"));
    }
}
