//! End-to-end translation tests over the public API.
//!
//! These exercise the advertised contract: parsing a canonical program and
//! generating it back reproduces the text exactly, and reparsing generated
//! text restores a structurally identical workspace, including procedure
//! registry state and host-registered kinds.

use std::sync::Arc;

use test_log::test;

use tangle_core::{
    catalog::{KindSpec, NodeCatalog, RenderRule},
    codegen::{CodeGenerator, GeneratorConfig},
    graph::{structural_eq, Workspace},
    parser::CodeParser,
    types::{SlotType, TypeSet},
    TangleError,
};

fn catalog() -> Arc<NodeCatalog> {
    Arc::new(NodeCatalog::create())
}

// Definitions are spelled in name order because generation hoists them
// that way; keeping the source in canonical order makes it a fixed point.
const PROGRAM: &str = concat!(
    "function clamp(/*type:Number*/ value, /*type:Number*/ limit) /*returns:Number*/ {\n",
    "  if (value > limit) {\n",
    "    return limit;\n",
    "  } else if (value < 0) {\n",
    "    return 0;\n",
    "  } else {\n",
    "    return value;\n",
    "  }\n",
    "}\n",
    "function* countdown(/*type:Number*/ start) /*returns:Number*/ {\n",
    "  for (let i = 0; i < start; i++) {\n",
    "    yield start - i;\n",
    "  }\n",
    "}\n",
    "let /*type:Array*/ scores;\n",
    "scores = [10, 25, 3];\n",
    "let /*type:Number*/ best;\n",
    "best = 0;\n",
    "for (const score of scores) {\n",
    "  best = Math.max(best, clamp(score, 20));\n",
    "}\n",
    "try {\n",
    "  this.say(String(best));\n",
    "} catch (problem) {\n",
    "  this.say(problem);\n",
    "} finally {\n",
    "  this.setBackground(rgb(0, best, 0));\n",
    "}\n",
);

#[test(tokio::test)]
async fn test_program_is_a_generation_fixed_point() {
    let parser = CodeParser::new(catalog());
    let ws = parser.parse(PROGRAM).await.unwrap();
    let text = CodeGenerator::new().generate(&ws).unwrap();
    assert_eq!(text, PROGRAM);
}

#[test(tokio::test)]
async fn test_reparse_is_structurally_identical() {
    let parser = CodeParser::new(catalog());
    let first = parser.parse(PROGRAM).await.unwrap();
    let text = CodeGenerator::new().generate(&first).unwrap();
    let second = parser.parse(&text).await.unwrap();
    assert!(structural_eq(&first, &second));

    // Registry contents survive the trip too.
    assert_eq!(
        first.procedures().names().collect::<Vec<_>>(),
        second.procedures().names().collect::<Vec<_>>()
    );
    assert_eq!(
        first.procedures().signature("clamp"),
        second.procedures().signature("clamp")
    );
}

#[test(tokio::test)]
async fn test_snapshot_survives_persistence_and_still_generates() {
    let parser = CodeParser::new(catalog());
    let ws = parser.parse(PROGRAM).await.unwrap();
    let json = ws.to_json().unwrap();
    let restored = Workspace::from_json(catalog(), &json).unwrap();
    assert!(structural_eq(&ws, &restored));
    assert_eq!(
        CodeGenerator::new().generate(&restored).unwrap(),
        CodeGenerator::new().generate(&ws).unwrap()
    );
}

#[test(tokio::test)]
async fn test_host_registered_actor_kind_round_trips() {
    let mut catalog = NodeCatalog::create();
    catalog.register(
        KindSpec::statement("spin")
            .value("DEGREES", TypeSet::single(SlotType::Number))
            .render(RenderRule::ActorMethod("spin")),
    );
    let catalog = Arc::new(catalog);

    let source = "this.spin(90);\n";
    let parser = CodeParser::new(catalog.clone());
    let ws = parser.parse(source).await.unwrap();
    let head = ws.roots()[0];
    assert_eq!(ws.node(head).unwrap().kind, "spin");
    assert_eq!(CodeGenerator::new().generate(&ws).unwrap(), source);

    // The same method is still unknown to the stock catalog.
    let stock = CodeParser::new(Arc::new(NodeCatalog::create()));
    assert!(matches!(
        stock.parse(source).await.unwrap_err(),
        TangleError::UnsupportedSyntax { .. }
    ));
}

#[test(tokio::test)]
async fn test_failed_reparse_preserves_edited_workspace() {
    let parser = CodeParser::new(catalog());
    let mut ws = parser.parse(PROGRAM).await.unwrap();
    let before = CodeGenerator::new().generate(&ws).unwrap();

    let err = parser
        .parse_into("let ok;\nswitch (ok) {}\n", &mut ws)
        .await
        .unwrap_err();
    assert!(matches!(err, TangleError::UnsupportedSyntax { .. }));
    assert_eq!(CodeGenerator::new().generate(&ws).unwrap(), before);
}

#[test(tokio::test)]
async fn test_loop_pause_output_is_not_round_trip_input() {
    let parser = CodeParser::new(catalog());
    let ws = parser
        .parse("while (true) {\n  this.wait(1);\n}\n")
        .await
        .unwrap();
    let paced = CodeGenerator::with_config(GeneratorConfig {
        indent: "  ".to_string(),
        loop_pause: Some("pause".to_string()),
    });
    let text = paced.generate(&ws).unwrap();
    assert!(text.contains("  pause();\n"));
    // The injected host primitive is not a declared procedure, so paced
    // output does not reparse; hosts feed the default-mode text back.
    assert!(parser.parse(&text).await.is_err());
    let canonical = CodeGenerator::new().generate(&ws).unwrap();
    let second = parser.parse(&canonical).await.unwrap();
    assert!(structural_eq(&ws, &second));
}
