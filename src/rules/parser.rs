//! Combinateurs `nom` de la syntaxe des modules de règles.

use nom::branch::alt;
use nom::bytes::complete::{escaped_transform, is_not, tag, take_while, take_while1};
use nom::character::complete::{char as pchar, digit1, multispace1, not_line_ending, satisfy};
use nom::combinator::{all_consuming, map, map_res, not, opt, recognize, value, verify};
use nom::multi::{fold_many0, many0, many0_count};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;

use crate::core::expr::{BinOp, Constraint, Expr, ExprKind, LetBinding, Phase, Quantifier};
use crate::core::typeside::Value;
use crate::error::ParseError;

use super::RuleModule;

const KEYWORDS: &[&str] = &[
    "module", "end", "let", "true", "false", "null", "or", "implies", "exists", "forall",
];

/// Applique `parser` au texte entier et convertit l'échec en `ParseError`
/// positionnée (ligne, colonne).
pub(super) fn run<'a, O>(text: &'a str, parser: fn(&'a str) -> IResult<&'a str, O>) -> Result<O, ParseError> {
    match all_consuming(ws(parser))(text) {
        Ok((_, out)) => Ok(out),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(located(text, e.input, format!("{:?}", e.code))),
        Err(nom::Err::Incomplete(_)) => Err(located(text, "", "texte incomplet".to_string())),
    }
}

fn located(text: &str, rest: &str, code: String) -> ParseError {
    let offset = text.len().saturating_sub(rest.len());
    let consumed = &text[..offset];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    let near: String = rest.chars().take(24).collect();
    let message = if near.is_empty() {
        format!("fin de texte inattendue ({})", code)
    } else {
        format!("'{}' inattendu ({})", near.trim_end(), code)
    };
    ParseError { line, column, message }
}

// -----------------------------------------------------------------------------
// Lexèmes
// -----------------------------------------------------------------------------

/// Blancs et commentaires `--`
fn sp(input: &str) -> IResult<&str, ()> {
    value((), many0_count(alt((multispace1, preceded(tag("--"), not_line_ending)))))(input)
}

fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(sp, inner, sp)
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue)))(input)
}

/// Identifiant qui n'est pas un mot-clé
fn name(input: &str) -> IResult<&str, String> {
    map(verify(identifier, |s: &str| !KEYWORDS.contains(&s)), str::to_string)(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), not(satisfy(is_ident_continue)))
}

fn string_literal(input: &str) -> IResult<&str, String> {
    let escapes = alt((
        value("\\", tag("\\")),
        value("\"", tag("\"")),
        value("\n", tag("n")),
        value("\t", tag("t")),
        value("\r", tag("r")),
    ));
    delimited(
        pchar('"'),
        map(opt(escaped_transform(is_not("\\\""), '\\', escapes)), Option::unwrap_or_default),
        pchar('"'),
    )(input)
}

fn literal(input: &str) -> IResult<&str, Expr> {
    alt((
        map(
            map_res(
                recognize(tuple((opt(pchar('-')), digit1, pchar('.'), digit1))),
                |s: &str| s.parse::<f64>(),
            ),
            |r| Expr::literal(Value::Real(r)),
        ),
        map(
            map_res(recognize(pair(opt(pchar('-')), digit1)), |s: &str| s.parse::<i64>()),
            |n| Expr::literal(Value::Integer(n)),
        ),
        map(string_literal, |s| Expr::literal(Value::String(s))),
        map(keyword("true"), |_| Expr::boolean(true)),
        map(keyword("false"), |_| Expr::boolean(false)),
        map(keyword("null"), |_| Expr::literal(Value::Null)),
    ))(input)
}

// -----------------------------------------------------------------------------
// Expressions
// -----------------------------------------------------------------------------

pub(super) fn expr(input: &str) -> IResult<&str, Expr> {
    left_assoc(input, or_expr, implies_op)
}

fn or_expr(input: &str) -> IResult<&str, Expr> {
    left_assoc(input, and_expr, or_op)
}

fn and_expr(input: &str) -> IResult<&str, Expr> {
    left_assoc(input, comparison, and_op)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    left_assoc(input, additive, cmp_op)
}

fn additive(input: &str) -> IResult<&str, Expr> {
    left_assoc(input, multiplicative, add_op)
}

fn multiplicative(input: &str) -> IResult<&str, Expr> {
    left_assoc(input, postfix, mul_op)
}

/// `operand (op operand)*`, regroupé à gauche
fn left_assoc<'a>(
    input: &'a str,
    operand: fn(&'a str) -> IResult<&'a str, Expr>,
    op: fn(&'a str) -> IResult<&'a str, BinOp>,
) -> IResult<&'a str, Expr> {
    let (input, first) = operand(input)?;
    let mut first = Some(first);
    fold_many0(
        pair(op, operand),
        move || first.take().unwrap_or_else(|| Expr::boolean(true)),
        |lhs, (op, rhs)| Expr::binary(op, lhs, rhs),
    )(input)
}

fn implies_op(input: &str) -> IResult<&str, BinOp> {
    value(BinOp::Implies, ws(keyword("implies")))(input)
}

fn or_op(input: &str) -> IResult<&str, BinOp> {
    value(BinOp::Or, ws(keyword("or")))(input)
}

fn and_op(input: &str) -> IResult<&str, BinOp> {
    value(BinOp::And, ws(pchar('&')))(input)
}

fn cmp_op(input: &str) -> IResult<&str, BinOp> {
    ws(alt((
        value(BinOp::Le, tag("<=")),
        value(BinOp::Ge, tag(">=")),
        value(BinOp::Ne, tag("/=")),
        // `=>` sépare les deux membres d'une règle
        value(BinOp::Eq, terminated(pchar('='), not(pchar('>')))),
        value(BinOp::Lt, pchar('<')),
        value(BinOp::Gt, pchar('>')),
    )))(input)
}

fn add_op(input: &str) -> IResult<&str, BinOp> {
    ws(alt((value(BinOp::Add, pchar('+')), value(BinOp::Sub, pchar('-')))))(input)
}

fn mul_op(input: &str) -> IResult<&str, BinOp> {
    ws(alt((
        value(BinOp::Mul, pchar('*')),
        value(BinOp::Div, terminated(pchar('/'), not(pchar('=')))),
    )))(input)
}

/// `primary`, suivi de navigations `.nom` et de recherches par clé `[expr]`
fn postfix(input: &str) -> IResult<&str, Expr> {
    let (mut input, mut acc) = primary(input)?;
    loop {
        if let Ok((rest, field)) = preceded(ws(pchar('.')), name)(input) {
            acc = Expr::attribute(Some(acc), &field);
            input = rest;
            continue;
        }
        let class = match &acc.kind {
            ExprKind::Variable(class) => Some(class.clone()),
            _ => None,
        };
        if let Some(class) = class {
            if let Ok((rest, key)) = delimited(ws(pchar('[')), expr, ws(pchar(']')))(input) {
                acc = Expr::class_ref(&class, Some(key));
                input = rest;
                continue;
            }
        }
        return Ok((input, acc));
    }
}

fn primary(input: &str) -> IResult<&str, Expr> {
    ws(alt((
        delimited(pchar('('), expr, ws(pchar(')'))),
        set_builder,
        literal,
        map(name, |n| Expr::var(&n)),
    )))(input)
}

fn set_builder(input: &str) -> IResult<&str, Expr> {
    let (input, quantifier) = alt((
        value(Quantifier::Exists, keyword("exists")),
        value(Quantifier::ForAll, keyword("forall")),
        value(Quantifier::Count, tag("#")),
    ))(input)?;
    let (input, _) = ws(pchar('{'))(input)?;
    let (input, var) = name(input)?;
    let (input, _) = ws(pchar(':'))(input)?;
    let (input, entity) = name(input)?;
    let (input, _) = ws(pchar('|'))(input)?;
    let (input, body) = expr(input)?;
    let (input, _) = ws(pchar('}'))(input)?;
    Ok((input, Expr::set_builder(quantifier, &var, &entity, body)))
}

// -----------------------------------------------------------------------------
// Règles et modules
// -----------------------------------------------------------------------------

/// `Set(T)`, `Sequence(T)` ou un nom simple
fn type_name(input: &str) -> IResult<&str, String> {
    alt((
        map(
            tuple((alt((tag("Set"), tag("Sequence"))), ws(pchar('(')), type_name, ws(pchar(')')))),
            |(kind, _, inner, _)| format!("{}({})", kind, inner),
        ),
        map(identifier, str::to_string),
    ))(input)
}

fn let_binding(input: &str) -> IResult<&str, LetBinding> {
    let (input, _) = ws(keyword("let"))(input)?;
    let (input, var) = ws(name)(input)?;
    let (input, _) = ws(pchar(':'))(input)?;
    let (input, ty) = ws(type_name)(input)?;
    let (input, _) = ws(pchar('='))(input)?;
    let (input, bound) = expr(input)?;
    let (input, _) = ws(pchar(';'))(input)?;
    Ok((input, LetBinding { name: var, type_name: ty, ty: None, expr: bound }))
}

pub(super) fn rule(input: &str) -> IResult<&str, Constraint> {
    let (input, owner) = ws(name)(input)?;
    let (input, _) = ws(tag("::"))(input)?;
    let (input, lets) = many0(let_binding)(input)?;
    let (input, antecedent) = expr(input)?;
    let (input, _) = ws(tag("=>"))(input)?;
    let (input, succedent) = expr(input)?;
    let (input, _) = ws(pchar(';'))(input)?;
    Ok((
        input,
        Constraint {
            owner,
            owner_ref: None,
            lets,
            antecedent,
            succedent,
            phase: Phase::Module,
        },
    ))
}

pub(super) fn module(input: &str) -> IResult<&str, RuleModule> {
    let (input, _) = ws(keyword("module"))(input)?;
    let (input, name) = ws(name)(input)?;
    let (input, rules) = many0(rule)(input)?;
    let (input, _) = ws(keyword("end"))(input)?;
    Ok((input, RuleModule { name, rules }))
}
