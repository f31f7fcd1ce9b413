// =============================================================================
// METASYNTH — Synthèse de correspondances entre métamodèles
// =============================================================================
//
// Étant donnés un métamodèle source et un métamodèle cible, metasynth :
//   1. énumère les correspondances injectives compatibles entre entités,
//      puis entre attributs et associations
//   2. retient la correspondance de meilleur score
//   3. en tire des contraintes déclaratives en deux phases :
//        phase 1 : un objet cible par objet source, attributs copiés
//        phase 2 : les liens, retrouvés par clé
//
// Le mode raffinement part d'un seul métamodèle, le duplique (IN$ / OUT$)
// et ajoute les règles d'un module externe.
//
// Architecture :
//   core/    → catalogues, énumération, synthèse, typage, exécution
//   rules/   → lecture des modules de règles (texte → contraintes)
//   config   → réglages (préfixes, départage, stratégie)
//   error    → les erreurs, une énumération par préoccupation
//
// =============================================================================

pub mod config;
pub mod core;
pub mod error;
pub mod rules;
