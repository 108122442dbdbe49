// Copyright © 2025 mailfabric contributors
// Licensed under the MIT License. See LICENSE for details.

mod datadog;
mod github;
mod github_actions;
mod gitlab;
mod jira;
mod notion;
mod slack;
mod stripe;

use super::ServiceParser;

pub fn all() -> Vec<Box<dyn ServiceParser>> {
    vec![
        Box::new(github::GitHubParser),
        Box::new(github_actions::GitHubActionsParser),
        Box::new(gitlab::GitLabParser),
        Box::new(jira::JiraParser),
        Box::new(slack::SlackParser),
        Box::new(notion::NotionParser),
        Box::new(datadog::DatadogParser),
        Box::new(stripe::StripeParser),
    ]
}

/// Shared helper: does the subject contain any of `needles`, case-insensitively?
pub(super) fn subject_has(subject: &str, needles: &[&str]) -> bool {
    let lower = subject.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}

#[cfg(test)]
pub(super) fn sample_message(subject: &str, from_addr: &str) -> crate::modules::provider::ProviderMailMessage {
    crate::modules::provider::ProviderMailMessage {
        external_id: String::new(),
        thread_id: String::new(),
        subject: subject.to_owned(),
        from_addr: from_addr.to_owned(),
        to_addrs: Vec::new(),
        cc_addrs: Vec::new(),
        internal_date: 0,
        snippet: String::new(),
        labels: Vec::new(),
        headers: Default::default(),
        html_body: None,
        text_body: None,
    }
}
