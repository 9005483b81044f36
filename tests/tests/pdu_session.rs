use amf::consumers::SmCause;
use amf::data::AccessType;
use amf::protocols::nas::{RequestType, cause};
use amf::protocols::ngap::NgapMessage;
use amf_tests::{DEFAULT_DNN, MockUe, framework::*};

#[async_std::test]
async fn pdu_session_relay() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    // When the UE asks for a PDU session
    ue.send_pdu_session_establishment_request(1).await?;

    // Then the AMF creates an SM context for it
    eventually(|| network.sm_contexts().len() == 1, "SM context creation").await?;
    let created = &network.sm_contexts()[0];
    assert_eq!(created.pdu_session_id, 1);
    assert_eq!(created.dnn, DEFAULT_DNN);
    assert_eq!(created.an_type, AccessType::ThreeGpp);
    assert_eq!(created.supi, ue.imsi);

    // And relays later 5GSM messages both ways.
    let modification_request = vec![0x2e, 0x01, 0x02, 0xc9];
    ue.send_5gsm(1, RequestType::ExistingPduSession, modification_request.clone())
        .await?;
    let transport = ue.receive_dl_nas_transport().await?;
    assert_eq!(transport.pdu_session_id, Some(1));
    assert_eq!(transport.payload_container, modification_request);
    assert_eq!(transport.cause, None);
    Ok(())
}

#[async_std::test]
async fn emergency_session_is_not_forwarded() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;

    ue.send_5gsm(2, RequestType::InitialEmergencyRequest, vec![0x2e, 0x02, 0x01, 0xc1])
        .await?;
    let transport = ue.receive_dl_nas_transport().await?;
    assert_eq!(transport.pdu_session_id, Some(2));
    assert_eq!(transport.cause, Some(cause::PAYLOAD_WAS_NOT_FORWARDED));
    assert!(network.sm_contexts().is_empty());
    Ok(())
}

#[async_std::test]
async fn duplicate_session_id_replaces_old_session() -> anyhow::Result<()> {
    let (amf, gnb, network, logger) = init()?;
    let mut ue = MockUe::new(1, &amf, &gnb, &network, &logger);
    ue.register(true).await?;
    ue.send_pdu_session_establishment_request(5).await?;
    eventually(|| network.sm_contexts_created() == 1, "first SM context").await?;

    // When the UE reuses the PDU session ID
    ue.send_pdu_session_establishment_request(5).await?;

    // Then the old session is released at the SMF and in the RAN
    let pdu = gnb.receive_ngap().await?;
    let NgapMessage::PduSessionResourceReleaseCommand { sessions, .. } = pdu.message else {
        anyhow::bail!("Expected PDU Session Resource Release Command, got {:?}", pdu.message)
    };
    assert_eq!(sessions[0].pdu_session_id, 5);
    assert!(network.sm_context_updates().iter().any(|u| {
        u.release && u.cause == Some(SmCause::RelDueToDuplicateSessionId)
    }));

    // And a new one is created in its place.
    eventually(|| network.sm_contexts_created() == 2, "second SM context").await?;
    assert_eq!(network.sm_contexts().len(), 1);
    Ok(())
}
