// =============================================================================
// CORE — Synthèse de correspondances entre métamodèles
// =============================================================================
//
// Le cœur ne fait aucune E/S : il reçoit des catalogues, rend des plans,
// des contraintes et des graphes d'objets.
//
// Architecture :
//   typeside       → les types et les valeurs littérales
//   catalog        → un métamodèle (entités, attributs, associations)
//   correspondence → une carte injective partielle source → cible
//   enumerate      → toutes les cartes maximales (générique)
//   compat         → quelles paires sont compatibles
//   score          → évaluation des cartes, choix du meilleur plan
//   expr           → arbre des expressions, contraintes, cas d'utilisation
//   synthesize     → contraintes de copie en deux phases
//   heuristic      → plan par convention de nommage
//   typecheck      → validation des catalogues, typage des contraintes
//   refine         → le mode raffinement de bout en bout
//   instance       → graphe d'objets conforme à un catalogue
//   execute        → interpréteur de règles sur les instances
//
// Flux :
//
//   Catalog ─▶ enumerate/compat ─▶ score ─▶ synthesize ─▶ UseCase
//                                                          │
//                                   typecheck ◀────────────┤
//                                                          ▼
//                              Instance (source) ─▶ execute ─▶ Instance (cible)
//
// =============================================================================

pub mod typeside;
pub mod catalog;
pub mod correspondence;
pub mod enumerate;
pub mod compat;
pub mod score;
pub mod expr;
pub mod synthesize;
pub mod heuristic;
pub mod typecheck;
pub mod refine;
pub mod instance;
pub mod execute;
