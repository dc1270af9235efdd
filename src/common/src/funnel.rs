use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::CommonError;
use crate::error::Result;
use crate::types::RATE_SUFFIX;

/// One step of a conversion funnel. `previous` names the stage whose total is
/// used as the denominator of this stage's rate.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Stage {
    pub order: usize,
    pub name: String,
    pub display_name: String,
    pub previous: Option<String>,
}

impl Stage {
    pub fn new(order: usize, name: &str, display_name: &str, previous: Option<&str>) -> Self {
        Self {
            order,
            name: name.to_string(),
            display_name: display_name.to_string(),
            previous: previous.map(|v| v.to_string()),
        }
    }

    pub fn is_revenue(&self) -> bool {
        self.name.to_lowercase().contains("revenue")
    }

    /// Label of the derived column: a percentage rate for regular stages and
    /// an average value per predecessor for revenue stages.
    pub fn rate_label(&self) -> String {
        if self.is_revenue() {
            let inferred = self.name.replace("revenue", "").replace('_', "");
            format!("Avg. {} Value", capitalize(&inferred))
        } else {
            format!("{} {RATE_SUFFIX}", self.display_name)
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
    }
}

/// Validated, ordered stage list with predecessors resolved to indices.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Funnel {
    stages: Vec<Stage>,
    previous: Vec<Option<usize>>,
}

impl Funnel {
    pub fn try_new(mut stages: Vec<Stage>) -> Result<Self> {
        if stages.is_empty() {
            return Err(CommonError::InvalidFunnel("no stages defined".to_string()));
        }
        stages.sort_by_key(|s| s.order);

        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(stages.len());
        for (idx, stage) in stages.iter().enumerate() {
            if positions.insert(stage.name.as_str(), idx).is_some() {
                return Err(CommonError::InvalidFunnel(format!(
                    "duplicate stage {:?}",
                    stage.name
                )));
            }
        }

        let mut previous = Vec::with_capacity(stages.len());
        for (idx, stage) in stages.iter().enumerate() {
            match (&stage.previous, idx) {
                (None, 0) => previous.push(None),
                (Some(prev), 0) => {
                    return Err(CommonError::InvalidFunnel(format!(
                        "first stage {:?} can't have previous stage {prev:?}",
                        stage.name
                    )));
                }
                (None, _) => {
                    return Err(CommonError::InvalidFunnel(format!(
                        "stage {:?} has no previous stage",
                        stage.name
                    )));
                }
                (Some(prev), _) => match positions.get(prev.as_str()) {
                    None => {
                        return Err(CommonError::InvalidFunnel(format!(
                            "stage {:?} refers to unknown stage {prev:?}",
                            stage.name
                        )));
                    }
                    Some(&prev_idx) if prev_idx >= idx => {
                        return Err(CommonError::InvalidFunnel(format!(
                            "stage {:?} must come after its previous stage {prev:?}",
                            stage.name
                        )));
                    }
                    Some(&prev_idx) => previous.push(Some(prev_idx)),
                },
            }
        }

        Ok(Self { stages, previous })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn previous_idx(&self, idx: usize) -> Option<usize> {
        self.previous[idx]
    }

    pub fn previous(&self, idx: usize) -> Option<&Stage> {
        self.previous[idx].map(|prev| &self.stages[prev])
    }
}

pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage::new(0, "impressions", "Impressions", None),
        Stage::new(1, "page_views", "Page views", Some("impressions")),
        Stage::new(2, "view_search_results", "SRP progression", Some("page_views")),
        Stage::new(3, "view_item_lists", "PLP progression", Some("page_views")),
        Stage::new(4, "view_items", "PDP progression", Some("page_views")),
        Stage::new(5, "add_to_carts", "Add to cart rate", Some("view_items")),
        Stage::new(6, "view_carts", "Cart progression", Some("page_views")),
        Stage::new(
            7,
            "select_fulfillment",
            "Checkout delivery progression",
            Some("view_carts"),
        ),
        Stage::new(
            8,
            "select_payment",
            "Checkout payment progression",
            Some("select_fulfillment"),
        ),
        Stage::new(9, "purchases", "Purchases", Some("select_payment")),
        Stage::new(
            10,
            "transaction_revenue",
            "Transaction Revenue",
            Some("purchases"),
        ),
    ]
}
