//! Configuration de la synthèse.
//!
//! Tous les champs ont une valeur par défaut : un fichier JSON vide (`{}`)
//! donne la configuration standard (préfixes `IN$` / `OUT$`, départage au
//! premier candidat énuméré, stratégie heuristique, typage activé).

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Préfixes qui distinguent les entités d'entrée et de sortie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConvention {
    pub input_prefix: String,
    pub output_prefix: String,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            input_prefix: "IN$".to_string(),
            output_prefix: "OUT$".to_string(),
        }
    }
}

impl NamingConvention {
    pub fn new(input_prefix: &str, output_prefix: &str) -> Self {
        Self {
            input_prefix: input_prefix.to_string(),
            output_prefix: output_prefix.to_string(),
        }
    }
}

/// Règle de départage entre cartes d'entités de même score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// La première carte énumérée l'emporte
    #[default]
    FirstEnumerated,
    /// À score égal, la carte dont les entités cibles portent le plus
    /// d'attributs l'emporte
    MostTargetAttributes,
}

/// Construction de la carte en mode raffinement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineStrategy {
    /// Appariement par nom via la convention de nommage
    #[default]
    Heuristic,
    /// Carte 1:1 issue de la duplication, caractéristiques à l'identique
    Duplicated,
}

/// Configuration complète.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    pub naming: NamingConvention,
    pub tie_break: TieBreak,
    pub refine_strategy: RefineStrategy,
    /// Typer le cas d'utilisation produit
    pub typecheck: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            naming: NamingConvention::default(),
            tie_break: TieBreak::default(),
            refine_strategy: RefineStrategy::default(),
            typecheck: true,
        }
    }
}

impl SynthesisConfig {
    /// Lit une configuration depuis un texte JSON.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let config: SynthesisConfig = serde_json::from_str(text)?;
        config.announce();
        Ok(config)
    }

    /// Lit une configuration depuis un fichier JSON.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }

    /// Signale les réglages qui changent le comportement par défaut.
    fn announce(&self) {
        if self.tie_break != TieBreak::FirstEnumerated {
            warn!(
                tie_break = ?self.tie_break,
                "départage non standard : les cartes retenues peuvent différer du premier candidat"
            );
        }
        if !self.typecheck {
            warn!("typage du cas d'utilisation désactivé");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_gives_defaults() {
        let config = SynthesisConfig::from_json("{}").unwrap();
        assert_eq!(config, SynthesisConfig::default());
        assert_eq!(config.naming.input_prefix, "IN$");
        assert!(config.typecheck);
    }

    #[test]
    fn test_partial_override() {
        let config = SynthesisConfig::from_json(
            r#"{ "tie_break": "most_target_attributes",
                 "naming": { "output_prefix": "TGT_" } }"#,
        ).unwrap();
        assert_eq!(config.tie_break, TieBreak::MostTargetAttributes);
        assert_eq!(config.naming.input_prefix, "IN$");
        assert_eq!(config.naming.output_prefix, "TGT_");
        assert_eq!(config.refine_strategy, RefineStrategy::Heuristic);
    }

    #[test]
    fn test_unknown_strategy_is_rejected() {
        assert!(SynthesisConfig::from_json(r#"{ "refine_strategy": "magic" }"#).is_err());
    }
}
