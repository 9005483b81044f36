use amf::data::AccessType;
use amf::protocols::ngap::NasCause;
use amf_tests::{MockUe, framework::*};

#[async_std::test]
async fn deregistration() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;

    // Given a registered UE with a PDU session
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;
    ue.send_pdu_session_establishment_request(1).await?;
    eventually(|| network.sm_contexts().len() == 1, "SM context creation").await?;

    // When the UE deregisters
    ue.send_deregistration_request(false).await?;

    // Then the AMF accepts, releases the context and forgets the UE.
    ue.receive_deregistration_accept().await?;
    assert_eq!(ue.handle_ue_context_release().await?, NasCause::Deregister);
    wait_for_ue_count(&amf, 0).await?;
    assert!(network.sm_contexts().is_empty());
    assert_eq!(network.am_policy_count(), 0);
    Ok(())
}

#[async_std::test]
async fn switch_off() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    // A switched off UE gets no Deregistration Accept.
    ue.send_deregistration_request(true).await?;
    assert_eq!(ue.handle_ue_context_release().await?, NasCause::Deregister);
    wait_for_ue_count(&amf, 0).await
}

#[async_std::test]
async fn network_initiated_deregistration() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    // When the network deregisters a connected UE
    amf.network_initiated_deregistration(&ue.imsi, AccessType::ThreeGpp)
        .await?;

    // Then the UE is told to register again and, once it accepts, is removed.
    let request = ue.handle_deregistration_request().await?;
    assert!(request.reregistration_required);
    assert_eq!(ue.handle_ue_context_release().await?, NasCause::Deregister);
    wait_for_ue_count(&amf, 0).await?;
    assert_eq!(network.am_policy_count(), 0);
    Ok(())
}
