// =============================================================================
// RULES — Lecture des modules de règles
// =============================================================================
//
// Un module de règles est un texte de la forme :
//
//   module Nom
//     -- commentaire jusqu'à la fin de la ligne
//     Owner :: antécédent => succédent ;
//     Owner :: let x : Type = expr ; antécédent => succédent ;
//   end
//
// GRAMMAIRE DES EXPRESSIONS (du moins au plus prioritaire) :
//
//   expr     := or ("implies" or)*
//   or       := and ("or" and)*
//   and      := cmp ("&" cmp)*
//   cmp      := add (("=" | "/=" | "<" | ">" | "<=" | ">=") add)*
//   add      := mul (("+" | "-") mul)*
//   mul      := postfix (("*" | "/") postfix)*
//   postfix  := primary ("." nom | "[" expr "]")*
//   primary  := "(" expr ")"
//             | ("exists" | "forall" | "#") "{" nom ":" nom "|" expr "}"
//             | littéral | nom
//
// Les noms peuvent contenir `$` (`$id`, `IN$Order`). Le lecteur ne connaît
// pas les catalogues : un nom nu reste une Variable et `a.b` un Attribute,
// c'est le typage qui les reclasse (attribut de self, rôle, classe).
//
// `=>` sépare antécédent et succédent ; l'implication logique s'écrit
// `implies`.
//
// =============================================================================

mod parser;

use crate::core::expr::{Constraint, Expr, UseCase};
use crate::error::ParseError;

/// Un module lu : son nom et ses règles, dans l'ordre du texte.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleModule {
    pub name: String,
    pub rules: Vec<Constraint>,
}

impl RuleModule {
    pub fn into_use_case(self) -> UseCase {
        UseCase { name: self.name, constraints: self.rules }
    }
}

/// Lit un module complet (`module Nom ... end`).
pub fn parse_module(text: &str) -> Result<RuleModule, ParseError> {
    parser::run(text, parser::module)
}

/// Lit une règle isolée (`Owner :: ... ;`).
pub fn parse_rule(text: &str) -> Result<Constraint, ParseError> {
    parser::run(text, parser::rule)
}

/// Lit une expression isolée.
pub fn parse_expr(text: &str) -> Result<Expr, ParseError> {
    parser::run(text, parser::expr)
}
