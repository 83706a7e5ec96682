use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use crate::config::MailboxConfig;
use crate::model::{
    Category, Entry, MailboxInsights, TemplateCandidate, TemplateConfidence, WorkflowShare,
};

pub const RESPONSE_BUCKETS: [&str; 5] = ["< 1 hour", "1-4 hours", "4-24 hours", "1-3 days", "> 3 days"];

pub fn analyze_mailbox(entries: &[Entry], config: &MailboxConfig) -> MailboxInsights {
    let messages = entries
        .iter()
        .filter(|entry| entry.is_message())
        .collect::<Vec<_>>();

    let mut insights = MailboxInsights {
        analyzed_messages: messages.len() as u64,
        response_distribution: RESPONSE_BUCKETS
            .iter()
            .map(|bucket| (bucket.to_string(), 0_u64))
            .collect(),
        ..MailboxInsights::default()
    };
    if messages.is_empty() {
        return insights;
    }

    insights.template_candidates = template_candidates(&messages, config);
    insights.workflows = workflow_shares(&messages, config);

    let gaps = response_gaps(&messages, config);
    if !gaps.is_empty() {
        insights.avg_response_hours = Some(gaps.iter().sum::<f64>() / gaps.len() as f64);
        for gap in &gaps {
            let bucket = RESPONSE_BUCKETS[bucket_index(*gap)];
            *insights
                .response_distribution
                .entry(bucket.to_string())
                .or_default() += 1;
        }
    }
    insights
}

fn template_candidates(messages: &[&Entry], config: &MailboxConfig) -> Vec<TemplateCandidate> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for message in messages {
        let subject = message
            .name
            .trim()
            .chars()
            .take(config.subject_chars)
            .collect::<String>();
        if subject.is_empty() {
            continue;
        }
        *counts.entry(subject).or_default() += 1;
    }

    let mut candidates = counts
        .into_iter()
        .filter(|(_, count)| *count > config.template_repeats)
        .map(|(subject, count)| TemplateCandidate {
            confidence: if count > config.strong_template_repeats {
                TemplateConfidence::High
            } else {
                TemplateConfidence::Medium
            },
            subject,
            count,
        })
        .collect::<Vec<_>>();
    candidates.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.subject.cmp(&b.subject)));
    candidates.truncate(config.max_template_candidates);
    candidates
}

fn workflow_shares(messages: &[&Entry], config: &MailboxConfig) -> Vec<WorkflowShare> {
    let mut volumes: BTreeMap<Category, u64> = BTreeMap::new();
    for message in messages {
        *volumes.entry(message.category).or_default() += 1;
    }

    let total = messages.len() as f64;
    let mut shares = volumes
        .into_iter()
        .filter(|(_, volume)| *volume as f64 / total > config.workflow_share)
        .map(|(category, volume)| WorkflowShare {
            category,
            volume,
            percentage: volume as f64 / total * 100.0,
        })
        .collect::<Vec<_>>();
    shares.sort_by(|a, b| b.volume.cmp(&a.volume).then_with(|| a.category.cmp(&b.category)));
    shares
}

/// Hours between consecutive messages of each thread, inside the configured window.
fn response_gaps(messages: &[&Entry], config: &MailboxConfig) -> Vec<f64> {
    let mut threads: HashMap<&str, Vec<DateTime<Utc>>> = HashMap::new();
    for message in messages {
        let (Some(thread), Some(sent)) = (message.thread_id.as_deref(), message_time(message))
        else {
            continue;
        };
        threads.entry(thread).or_default().push(sent);
    }

    let mut thread_ids = threads.keys().copied().collect::<Vec<_>>();
    thread_ids.sort_unstable();

    let mut gaps = Vec::new();
    for thread in thread_ids {
        let Some(times) = threads.get_mut(thread) else {
            continue;
        };
        times.sort_unstable();
        for pair in times.windows(2) {
            let hours = (pair[1] - pair[0]).num_seconds() as f64 / 3600.0;
            if hours > config.min_response_hours && hours < config.max_response_hours {
                gaps.push(hours);
            }
        }
    }
    gaps
}

fn message_time(message: &Entry) -> Option<DateTime<Utc>> {
    message.created.or(message.modified)
}

fn bucket_index(hours: f64) -> usize {
    if hours < 1.0 {
        0
    } else if hours < 4.0 {
        1
    } else if hours < 24.0 {
        2
    } else if hours < 72.0 {
        3
    } else {
        4
    }
}
