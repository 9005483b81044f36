use amf::protocols::ngap::NasCause;
use amf_tests::{MockUe, framework::*};

#[async_std::test]
async fn two_ues() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;

    // UE 1 registers
    let mut ue_1 = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue_1.register(true).await?;

    // UE 2 registers
    let mut ue_2 = MockUe::new(2, &amf, &gnb, &network, &logger);
    ue_2.register(true).await?;

    assert_ne!(ue_1.guti, ue_2.guti);
    assert_eq!(network.am_policy_count(), 2);
    assert_eq!(amf.ue_count(), 2);

    // UE 2 switches off without disturbing UE 1
    ue_2.send_deregistration_request(true).await?;
    assert_eq!(ue_2.handle_ue_context_release().await?, NasCause::Deregister);
    wait_for_ue_count(&amf, 1).await?;
    assert_eq!(network.am_policy_count(), 1);

    // UE 1 deregisters
    ue_1.send_deregistration_request(false).await?;
    ue_1.receive_deregistration_accept().await?;
    assert_eq!(ue_1.handle_ue_context_release().await?, NasCause::Deregister);
    wait_for_ue_count(&amf, 0).await
}
