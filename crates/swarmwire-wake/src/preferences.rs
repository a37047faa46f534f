//! Notification preferences: decide wake vs queue vs skip for an
//! incoming message, without waking on every message by default.

use std::collections::HashSet;

use crate::error::WakeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NotificationLevel {
    Silent,
    Normal,
    Urgent,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Silent => "silent",
            NotificationLevel::Normal => "normal",
            NotificationLevel::Urgent => "urgent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WakeCondition {
    AnyMessage,
    DirectMention,
    HighPriority,
    FromSpecificAgent,
    KeywordMatch,
    SwarmSystemMessage,
}

impl WakeCondition {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any_message" => Some(WakeCondition::AnyMessage),
            "direct_mention" => Some(WakeCondition::DirectMention),
            "high_priority" => Some(WakeCondition::HighPriority),
            "from_specific_agent" => Some(WakeCondition::FromSpecificAgent),
            "keyword_match" => Some(WakeCondition::KeywordMatch),
            "swarm_system_message" => Some(WakeCondition::SwarmSystemMessage),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NotificationPreferences {
    pub enabled: bool,
    pub default_level: NotificationLevel,
    pub wake_conditions: HashSet<WakeCondition>,
    pub watched_agents: HashSet<String>,
    pub watched_keywords: HashSet<String>,
    pub muted_swarms: HashSet<String>,
    /// `(start_hour, end_hour)`, UTC, 0-23. Wraps when `start > end`.
    pub quiet_hours: Option<(u8, u8)>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        let mut wake_conditions = HashSet::new();
        wake_conditions.insert(WakeCondition::AnyMessage);
        Self {
            enabled: true,
            default_level: NotificationLevel::Normal,
            wake_conditions,
            watched_agents: HashSet::new(),
            watched_keywords: HashSet::new(),
            muted_swarms: HashSet::new(),
            quiet_hours: None,
        }
    }
}

/// Inputs for one wake-level evaluation.
pub struct MessageContext<'a> {
    pub sender_id: &'a str,
    pub swarm_id: &'a str,
    pub content: &'a str,
    pub is_direct_mention: bool,
    pub is_high_priority: bool,
    pub is_system_message: bool,
    pub current_hour: u8,
}

impl NotificationPreferences {
    pub fn validate(&self) -> Result<(), WakeError> {
        if let Some((start, end)) = self.quiet_hours {
            if start > 23 || end > 23 {
                return Err(WakeError::Validation("quiet hours must be 0-23".to_string()));
            }
        }
        Ok(())
    }

    pub fn should_wake(&self, ctx: &MessageContext) -> NotificationLevel {
        if !self.enabled {
            return NotificationLevel::Silent;
        }
        if self.muted_swarms.contains(ctx.swarm_id) {
            return NotificationLevel::Silent;
        }
        if self.is_quiet_hours(ctx.current_hour) {
            return if ctx.is_high_priority || ctx.is_system_message {
                NotificationLevel::Urgent
            } else {
                NotificationLevel::Silent
            };
        }

        let mut level = NotificationLevel::Silent;
        for condition in &self.wake_conditions {
            let contribution = match condition {
                WakeCondition::AnyMessage => self.default_level,
                WakeCondition::DirectMention if ctx.is_direct_mention => NotificationLevel::Urgent,
                WakeCondition::HighPriority if ctx.is_high_priority => NotificationLevel::Urgent,
                WakeCondition::FromSpecificAgent if self.watched_agents.contains(ctx.sender_id) => {
                    NotificationLevel::Urgent
                }
                WakeCondition::KeywordMatch if self.matches_keywords(ctx.content) => NotificationLevel::Urgent,
                WakeCondition::SwarmSystemMessage if ctx.is_system_message => NotificationLevel::Urgent,
                _ => NotificationLevel::Silent,
            };
            level = level.max(contribution);
        }
        level
    }

    fn is_quiet_hours(&self, current_hour: u8) -> bool {
        let Some((start, end)) = self.quiet_hours else {
            return false;
        };
        if start <= end {
            current_hour >= start && current_hour < end
        } else {
            current_hour >= start || current_hour < end
        }
    }

    fn matches_keywords(&self, content: &str) -> bool {
        let lowered = content.to_lowercase();
        self.watched_keywords.iter().any(|kw| lowered.contains(&kw.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx<'a>(sender_id: &'a str, swarm_id: &'a str, content: &'a str) -> MessageContext<'a> {
        MessageContext {
            sender_id,
            swarm_id,
            content,
            is_direct_mention: false,
            is_high_priority: false,
            is_system_message: false,
            current_hour: 12,
        }
    }

    #[test]
    fn disabled_preferences_are_always_silent() {
        let mut prefs = NotificationPreferences::default();
        prefs.enabled = false;
        assert_eq!(prefs.should_wake(&ctx("a", "s", "hi")), NotificationLevel::Silent);
    }

    #[test]
    fn muted_swarm_is_silent() {
        let mut prefs = NotificationPreferences::default();
        prefs.muted_swarms.insert("s1".to_string());
        assert_eq!(prefs.should_wake(&ctx("a", "s1", "hi")), NotificationLevel::Silent);
    }

    #[test]
    fn any_message_condition_uses_default_level() {
        let prefs = NotificationPreferences::default();
        assert_eq!(prefs.should_wake(&ctx("a", "s", "hi")), NotificationLevel::Normal);
    }

    #[test]
    fn quiet_hours_suppress_unless_urgent() {
        let mut prefs = NotificationPreferences::default();
        prefs.quiet_hours = Some((22, 6));
        let mut c = ctx("a", "s", "hi");
        c.current_hour = 23;
        assert_eq!(prefs.should_wake(&c), NotificationLevel::Silent);
        c.is_high_priority = true;
        assert_eq!(prefs.should_wake(&c), NotificationLevel::Urgent);
    }

    #[test]
    fn keyword_match_raises_to_urgent() {
        let mut prefs = NotificationPreferences::default();
        prefs.wake_conditions.insert(WakeCondition::KeywordMatch);
        prefs.watched_keywords.insert("URGENT".to_string());
        let c = ctx("a", "s", "this is Urgent news");
        assert_eq!(prefs.should_wake(&c), NotificationLevel::Urgent);
    }

    #[test]
    fn invalid_quiet_hours_rejected() {
        let mut prefs = NotificationPreferences::default();
        prefs.quiet_hours = Some((30, 5));
        assert_eq!(prefs.validate().unwrap_err().kind(), crate::error::ErrorKind::Validation);
    }
}
