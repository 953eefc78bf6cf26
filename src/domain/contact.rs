//! Per-contact history and engagement scoring.
//!
//! A contact moves `New -> Contacted -> {Replied | NotInterested}`. Bounces,
//! opt-outs and spam complaints are recorded separately as [`Suppressions`]:
//! every one that arrives is kept, none is ever cleared, and while any is set
//! the contact's status is absorbing.
//!
//! On disk a contact keeps the flat boolean layout (`replied`, `bounced`,
//! ...) so existing tooling can read it; [`ContactHistory`] converts to and
//! from that layout through serde.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Score assigned to addresses with no history.
pub const NEUTRAL_ENGAGEMENT: u8 = 50;

/// Lifecycle status of a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    /// Known address that was never approached
    New,
    /// Approached at least once, no response yet
    Contacted,
    /// Replied (possibly with interest)
    Replied,
    /// Declined
    NotInterested,
    /// Delivery bounced (absorbing)
    Bounced,
    /// Asked not to be contacted (absorbing)
    OptedOut,
    /// Reported the message as spam (absorbing)
    SpamComplaint,
}

impl ContactStatus {
    /// Whether this status can never be left.
    pub fn is_absorbing(self) -> bool {
        matches!(
            self,
            ContactStatus::Bounced | ContactStatus::OptedOut | ContactStatus::SpamComplaint
        )
    }

    /// Stable lower-case name.
    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::Contacted => "contacted",
            ContactStatus::Replied => "replied",
            ContactStatus::NotInterested => "not_interested",
            ContactStatus::Bounced => "bounced",
            ContactStatus::OptedOut => "opted_out",
            ContactStatus::SpamComplaint => "spam_complaint",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A response reported by the inbox side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    /// The contact replied
    Replied,
    /// The contact replied with interest
    Interested,
    /// The contact declined
    NotInterested,
    /// The contact clicked a tracked link
    ClickedLink,
    /// The message bounced
    Bounced,
    /// The contact opted out
    OptedOut,
    /// The contact reported the message as spam
    SpamComplaint,
}

impl ResponseType {
    /// Wire name, as used by the inbox-side collaborators.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseType::Replied => "replied",
            ResponseType::Interested => "interested",
            ResponseType::NotInterested => "not_interested",
            ResponseType::ClickedLink => "clicked_link",
            ResponseType::Bounced => "bounced",
            ResponseType::OptedOut => "opted_out",
            ResponseType::SpamComplaint => "spam_complaint",
        }
    }
}

impl fmt::Display for ResponseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a response-type string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown response type: {0:?}")]
pub struct ParseResponseError(pub String);

impl FromStr for ResponseType {
    type Err = ParseResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "replied" => Ok(ResponseType::Replied),
            "interested" => Ok(ResponseType::Interested),
            "not_interested" => Ok(ResponseType::NotInterested),
            "clicked_link" => Ok(ResponseType::ClickedLink),
            "bounced" => Ok(ResponseType::Bounced),
            "opted_out" => Ok(ResponseType::OptedOut),
            "spam_complaint" => Ok(ResponseType::SpamComplaint),
            _ => Err(ParseResponseError(s.to_string())),
        }
    }
}

/// Absorbing outcomes recorded for a contact.
///
/// Flags are only ever set. When several are set, they rank opted out, then
/// bounced, then spam complaint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Suppressions {
    /// The contact opted out
    pub opted_out: bool,
    /// A message to the contact bounced
    pub bounced: bool,
    /// The contact reported a message as spam
    pub spam_complaint: bool,
}

impl Suppressions {
    /// Whether any absorbing outcome was recorded.
    pub fn any(self) -> bool {
        self.opted_out || self.bounced || self.spam_complaint
    }

    /// Highest-ranked absorbing status, if any.
    pub fn status(self) -> Option<ContactStatus> {
        if self.opted_out {
            Some(ContactStatus::OptedOut)
        } else if self.bounced {
            Some(ContactStatus::Bounced)
        } else if self.spam_complaint {
            Some(ContactStatus::SpamComplaint)
        } else {
            None
        }
    }

    fn record(&mut self, response: ResponseType) -> bool {
        let flag = match response {
            ResponseType::OptedOut => &mut self.opted_out,
            ResponseType::Bounced => &mut self.bounced,
            ResponseType::SpamComplaint => &mut self.spam_complaint,
            _ => return false,
        };
        !std::mem::replace(flag, true)
    }
}

/// Non-absorbing engagement signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Signals {
    /// Any reply was received
    pub replied: bool,
    /// A reply expressed interest
    pub interested: bool,
    /// The contact declined
    pub not_interested: bool,
    /// Tracked link clicks
    pub clicked_links: u32,
}

/// Everything known about one address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ContactRecord", into = "ContactRecord")]
pub struct ContactHistory {
    first_contact: Option<NaiveDateTime>,
    last_contact: Option<NaiveDateTime>,
    last_reply: Option<NaiveDateTime>,
    contact_count: u32,
    campaigns: Vec<String>,
    signals: Signals,
    suppressions: Suppressions,
    // Lifecycle without suppressions; never an absorbing variant.
    lifecycle: ContactStatus,
}

impl Default for ContactHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactHistory {
    /// History for an address that has not been approached yet.
    pub fn new() -> Self {
        Self {
            first_contact: None,
            last_contact: None,
            last_reply: None,
            contact_count: 0,
            campaigns: Vec::new(),
            signals: Signals::default(),
            suppressions: Suppressions::default(),
            lifecycle: ContactStatus::New,
        }
    }

    /// Current status: the highest-ranked suppression if any, otherwise the
    /// lifecycle stage.
    pub fn status(&self) -> ContactStatus {
        self.suppressions.status().unwrap_or(self.lifecycle)
    }

    /// Absorbing outcomes recorded so far.
    pub fn suppressions(&self) -> Suppressions {
        self.suppressions
    }

    /// First time the address was approached.
    pub fn first_contact(&self) -> Option<NaiveDateTime> {
        self.first_contact
    }

    /// Most recent time the address was approached.
    pub fn last_contact(&self) -> Option<NaiveDateTime> {
        self.last_contact
    }

    /// Most recent reply.
    pub fn last_reply(&self) -> Option<NaiveDateTime> {
        self.last_reply
    }

    /// Times the address was approached. Never decreases.
    pub fn contact_count(&self) -> u32 {
        self.contact_count
    }

    /// Campaigns the address was approached for, in first-contact order.
    pub fn campaigns(&self) -> &[String] {
        &self.campaigns
    }

    /// Whether the address was approached for `campaign_id`.
    pub fn has_campaign(&self, campaign_id: &str) -> bool {
        self.campaigns.iter().any(|c| c == campaign_id)
    }

    /// Engagement signals collected so far.
    pub fn signals(&self) -> Signals {
        self.signals
    }

    /// Record one approach for `campaign_id`.
    pub fn record_contact(&mut self, campaign_id: &str, now: NaiveDateTime) {
        if self.first_contact.is_none() {
            self.first_contact = Some(now);
        }
        self.last_contact = Some(now);
        self.contact_count = self.contact_count.saturating_add(1);
        if !self.has_campaign(campaign_id) {
            self.campaigns.push(campaign_id.to_string());
        }
        if self.lifecycle == ContactStatus::New {
            self.lifecycle = ContactStatus::Contacted;
        }
    }

    /// Fold a response into the history.
    ///
    /// Returns `true` when the response added a suppression that was not
    /// recorded before.
    pub fn apply_response(&mut self, response: ResponseType, now: NaiveDateTime) -> bool {
        match response {
            ResponseType::Replied => {
                self.signals.replied = true;
                self.last_reply = Some(now);
            }
            ResponseType::Interested => {
                self.signals.replied = true;
                self.signals.interested = true;
            }
            ResponseType::NotInterested => self.signals.not_interested = true,
            ResponseType::ClickedLink => {
                self.signals.clicked_links = self.signals.clicked_links.saturating_add(1);
            }
            ResponseType::Bounced | ResponseType::OptedOut | ResponseType::SpamComplaint => {
                return self.suppressions.record(response);
            }
        }
        self.lifecycle = next_lifecycle(self.lifecycle, response);
        false
    }

    /// Engagement score in `[0, 100]`.
    ///
    /// Starts at 50; replies, interest and clicks raise it, declining and
    /// unanswered approaches lower it. Bounced and opted-out contacts score 0.
    pub fn engagement_score(&self) -> u8 {
        let s = &self.signals;
        let mut score: i64 = i64::from(NEUTRAL_ENGAGEMENT);

        if s.replied {
            score += 30;
        }
        if s.interested {
            score += 50;
        }
        if s.clicked_links > 0 {
            score += 20;
        }
        if s.not_interested {
            score -= 40;
        }
        if self.contact_count > 0 && !s.replied {
            score -= 10 * i64::from(self.contact_count);
        }
        if self.suppressions.opted_out || self.suppressions.bounced {
            score = 0;
        }

        u8::try_from(score.clamp(0, 100)).unwrap_or(0)
    }
}

fn next_lifecycle(current: ContactStatus, response: ResponseType) -> ContactStatus {
    match response {
        ResponseType::Replied | ResponseType::Interested => ContactStatus::Replied,
        ResponseType::NotInterested => ContactStatus::NotInterested,
        ResponseType::ClickedLink
        | ResponseType::Bounced
        | ResponseType::OptedOut
        | ResponseType::SpamComplaint => current,
    }
}

/// Flat on-disk layout of a contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ContactRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_contact: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_contact: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_reply: Option<NaiveDateTime>,
    contact_count: u32,
    campaigns: Vec<String>,
    replied: bool,
    interested: bool,
    not_interested: bool,
    bounced: bool,
    opted_out: bool,
    spam_complaint: bool,
    clicked_links: u32,
}

impl From<ContactRecord> for ContactHistory {
    fn from(r: ContactRecord) -> Self {
        let lifecycle = if r.not_interested {
            ContactStatus::NotInterested
        } else if r.replied || r.interested {
            ContactStatus::Replied
        } else if r.contact_count > 0 {
            ContactStatus::Contacted
        } else {
            ContactStatus::New
        };

        let mut campaigns: Vec<String> = Vec::with_capacity(r.campaigns.len());
        for campaign in r.campaigns {
            if !campaigns.contains(&campaign) {
                campaigns.push(campaign);
            }
        }

        Self {
            first_contact: r.first_contact,
            last_contact: r.last_contact,
            last_reply: r.last_reply,
            contact_count: r.contact_count,
            campaigns,
            signals: Signals {
                replied: r.replied || r.interested,
                interested: r.interested,
                not_interested: r.not_interested,
                clicked_links: r.clicked_links,
            },
            suppressions: Suppressions {
                opted_out: r.opted_out,
                bounced: r.bounced,
                spam_complaint: r.spam_complaint,
            },
            lifecycle,
        }
    }
}

impl From<ContactHistory> for ContactRecord {
    fn from(h: ContactHistory) -> Self {
        Self {
            first_contact: h.first_contact,
            last_contact: h.last_contact,
            last_reply: h.last_reply,
            contact_count: h.contact_count,
            campaigns: h.campaigns,
            replied: h.signals.replied,
            interested: h.signals.interested,
            not_interested: h.signals.not_interested,
            bounced: h.suppressions.bounced,
            opted_out: h.suppressions.opted_out,
            spam_complaint: h.suppressions.spam_complaint,
            clicked_links: h.signals.clicked_links,
        }
    }
}

/// Normalise an address for use as a history key.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
