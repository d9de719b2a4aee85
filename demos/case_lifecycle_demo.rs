//! 病例生命周期演示程序
//!
//! 展示从提交到完成的完整病例流程，包括状态转换、方案编辑锁定、
//! IPR 图表推导、并发冲突处理和再矫正申请

use aligner_core::{
    ActorRole, CaseError, CaseStatus, CaseStore, Diagnosis, IprEntry, Midline, MidlineState,
    NewCase, PlanUpdate,
};
use aligner_database::MemoryCaseStore;
use aligner_workflow::{ipr, CaseAction, CaseWorkflowEngine, Gap, Jaw};
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt::init();

    let engine = CaseWorkflowEngine::new();
    let store = MemoryCaseStore::new();

    println!("🦷 隐形矫正器病例生命周期演示\n");

    // 1. 医生提交病例
    let new_case = NewCase {
        parent_case_id: None,
        user_id: Uuid::new_v4(),
        admin_id: None,
        patient_first_name: "小明".to_string(),
        patient_last_name: "王".to_string(),
        plan: Default::default(),
        pricing: Default::default(),
        diagnosis: Diagnosis {
            upper_midline: Midline {
                state: MidlineState::ShiftedRight,
                shift_mm: Some(dec!(1.5)),
            },
            lower_midline: Midline::centered(),
            ..Default::default()
        },
        artifacts: Default::default(),
        urgency: Default::default(),
        tooth_status: BTreeMap::new(),
        ipr_data: BTreeMap::new(),
        refinement_reason: None,
    };
    let case = engine.create_case(&store, new_case).await?;
    println!("✅ 病例 {} 已提交，状态: {}", case.id, case.status);

    // 2. 查看运营方可执行的动作
    let actions = engine.list_available_actions(&case, ActorRole::Operator);
    println!("📋 运营方可执行动作: {:?}", actions);

    // 3. 运营方受理并制定方案
    engine
        .apply_transition(&store, case.id, CaseAction::Accept, ActorRole::Operator)
        .await?;
    let plan = PlanUpdate {
        upper_aligner_count: Some(18),
        lower_aligner_count: Some(16),
        duration_months: Some(9),
        aligner_material: Some("standard".to_string()),
        case_study_fee: Some(dec!(150.00)),
        aligners_price: Some(dec!(2400.00)),
        delivery_charges: Some(dec!(35.00)),
        ..Default::default()
    };
    let updated = engine.update_plan(&store, case.id, plan).await?;
    println!(
        "✅ 方案已制定: 上颌 {} 副 / 下颌 {} 副，总价 {}",
        updated.plan.upper_aligner_count.unwrap(),
        updated.plan.lower_aligner_count.unwrap(),
        updated.pricing.total()
    );

    // 4. 录入 IPR 图表
    let mut chart = BTreeMap::new();
    chart.insert(
        8,
        IprEntry {
            mesial: dec!(0.25),
            distal: dec!(0.0),
        },
    );
    chart.insert(
        9,
        IprEntry {
            mesial: dec!(0.25),
            distal: dec!(0.0),
        },
    );
    chart.insert(
        30,
        IprEntry {
            mesial: dec!(0.0),
            distal: dec!(0.3),
        },
    );
    let updated = engine
        .save_ipr_chart(&store, case.id, BTreeMap::new(), chart)
        .await?;
    println!("✅ IPR 图表已保存，记录 {} 颗牙", updated.ipr_data.len());

    // 上颌中线间隙由两侧近中值求和得出
    let midline_gap = ipr::derive(&updated.ipr_data, Gap::Between(8, 9))?;
    println!("📐 上颌中线间隙 (8|9): {:?} mm", midline_gap);
    let display = ipr::display_gaps(Jaw::Lower);
    println!("📐 下颌展示顺序共 {} 个间隙位", display.len());

    // 5. 提交医生确认
    engine
        .apply_transition(
            &store,
            case.id,
            CaseAction::SendForApproval,
            ActorRole::Operator,
        )
        .await?;
    println!("✅ 方案已提交医生确认");

    // 6. 并发冲突演示：医生确认与运营方拒绝同时发生
    let snapshot = store.get_case(case.id).await?;
    let approve_to = engine.attempt_transition(&snapshot, CaseAction::ApprovePlan, ActorRole::Clinician)?;
    let decline_to = engine.attempt_transition(&snapshot, CaseAction::Decline, ActorRole::Operator)?;
    store.update_status(case.id, snapshot.status, approve_to).await?;
    match store.update_status(case.id, snapshot.status, decline_to).await {
        Err(CaseError::Conflict(msg)) => println!("⚠️  并发写入被拒绝: {}", msg),
        other => println!("意外结果: {:?}", other.map(|r| r.status)),
    }

    // 7. 生产与交付
    for (action, label) in [
        (CaseAction::StartProduction, "开始生产"),
        (CaseAction::MarkReady, "生产完成待发货"),
        (CaseAction::MarkDelivered, "已发货"),
        (CaseAction::Complete, "治疗完成"),
    ] {
        let record = engine
            .apply_transition(&store, case.id, action, ActorRole::Operator)
            .await?;
        println!("🔄 {} -> {}", label, record.status);
    }

    // 8. 锁定验证：完成后方案不可再修改
    let late_edit = engine
        .update_plan(
            &store,
            case.id,
            PlanUpdate {
                upper_aligner_count: Some(20),
                ..Default::default()
            },
        )
        .await;
    match late_edit {
        Err(CaseError::Validation(msg)) => println!("🔒 方案编辑被锁定: {}", msg),
        other => println!("意外结果: {:?}", other.map(|r| r.status)),
    }

    // 9. 申请再矫正
    let refinement = engine
        .request_refinement(&store, case.id, "下牙弓轻度复发")
        .await?;
    println!(
        "✅ 再矫正子病例 {} 已创建 (父病例 {})，状态: {}",
        refinement.id,
        refinement.parent_case_id.unwrap(),
        refinement.status
    );
    assert_eq!(refinement.status, CaseStatus::Submitted);

    println!("\n🎉 病例生命周期演示完成!");
    Ok(())
}
